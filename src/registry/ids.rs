//! Public identifiers and the random sources they are minted from.

use std::{fmt, sync::Mutex};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use uuid::{Builder, Uuid};

/// Opaque public identifier handed out at registration.
///
/// Always a version 4 UUID; the 122 random bits come from an [`IdSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicId(Uuid);

impl PublicId {
    pub fn mint(source: &dyn IdSource) -> PublicId {
        PublicId(Builder::from_random_bytes(source.random_bytes()).into_uuid())
    }

    /// Parses a token taken from a link or path. Anything that is not a
    /// version 4 UUID is rejected.
    pub fn parse(raw: &str) -> Option<PublicId> {
        let uuid = Uuid::parse_str(raw.trim()).ok()?;
        (uuid.get_version_num() == 4).then_some(PublicId(uuid))
    }

    /// Canonical form of a referrer token: the hyphenated identifier when it
    /// parses, the token unchanged otherwise.
    pub fn canonical(raw: &str) -> String {
        match PublicId::parse(raw) {
            Some(id) => id.to_string(),
            None => raw.to_owned(),
        }
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

pub trait IdSource: Send + Sync {
    fn random_bytes(&self) -> [u8; 16];
}

/// Thread-local CSPRNG. Used by the server.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsIds;

impl IdSource for OsIds {
    fn random_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        rand::rng().fill(&mut bytes);
        bytes
    }
}

/// Deterministic source for reproducible runs.
#[derive(Debug)]
pub struct SeededIds(Mutex<StdRng>);

impl SeededIds {
    pub fn new(seed: u64) -> SeededIds {
        SeededIds(Mutex::new(StdRng::seed_from_u64(seed)))
    }
}

impl IdSource for SeededIds {
    fn random_bytes(&self) -> [u8; 16] {
        let mut rng = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut bytes = [0u8; 16];
        rng.fill(&mut bytes);
        bytes
    }
}
