mod ids;
mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub use ids::{IdSource, OsIds, PublicId, SeededIds};
pub use memory::MemoryRegistry;

/// Identity supplied by whoever captured the registration, e.g. a chat id.
/// Not unique and never used as a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InternalHandle {
    Number(i64),
    Text(String),
}

impl InternalHandle {
    pub fn is_blank(&self) -> bool {
        match self {
            InternalHandle::Number(_) => false,
            InternalHandle::Text(text) => text.trim().is_empty(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub internal_handle: Option<InternalHandle>,
    pub public_id: PublicId,
    pub created_at: OffsetDateTime,
}

/// Edge `referrer -> new_user`. The referrer token is kept as given
/// (canonicalised) even when it names nobody.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Referral {
    pub referrer_public_id: String,
    pub new_user_public_id: PublicId,
    pub timestamp: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegistryCounts {
    pub users: usize,
    pub referrals: usize,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("public id {0} was minted twice")]
    Collision(PublicId),

    #[error("registry lock poisoned")]
    Poisoned,
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Store of users and referral edges. Every error it returns is an
/// invariant violation; absence is reported as `None`.
pub trait Registry: Send + Sync {
    fn register(
        &self,
        internal_handle: Option<InternalHandle>,
        referrer: Option<&str>,
    ) -> RegistryResult<PublicId>;

    fn get_user(&self, public_id: &str) -> RegistryResult<Option<User>>;

    fn referred_by(&self, public_id: &PublicId) -> RegistryResult<Option<Referral>>;

    fn referrals_by(&self, referrer: &str) -> RegistryResult<Vec<Referral>>;

    fn counts(&self) -> RegistryResult<RegistryCounts>;
}
