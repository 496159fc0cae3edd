//! Request-level operations over a [`Registry`]. Holds no state of its own.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;

use crate::{
    AppError, AppResult,
    config::{Config, JoinMode},
    registry::{InternalHandle, PublicId, Registry, RegistryCounts},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub public_id: PublicId,
    pub join_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Redirect(String),
    Display(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    pub internal_handle: Option<InternalHandle>,
    pub public_id: PublicId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub referred_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralView {
    pub new_user_public_id: PublicId,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

pub struct ReferralService {
    registry: Arc<dyn Registry>,
    public_base_url: String,
    profile_view_url: String,
    join_mode: JoinMode,
    redact_internal_handle: bool,
}

impl ReferralService {
    pub fn new(registry: Arc<dyn Registry>, config: &Config) -> ReferralService {
        ReferralService {
            registry,
            public_base_url: config.public_base_url.clone(),
            profile_view_url: config.profile_view_url.clone(),
            join_mode: config.join_mode,
            redact_internal_handle: config.redact_internal_handle,
        }
    }

    pub fn join_url(&self, public_id: &PublicId) -> String {
        format!("{}/join?r={public_id}", self.public_base_url)
    }

    pub fn request_registration(
        &self,
        internal_handle: Option<InternalHandle>,
        referrer: Option<&str>,
    ) -> AppResult<Registration> {
        let Some(internal_handle) = internal_handle.filter(|h| !h.is_blank()) else {
            return Err(AppError::BadRequest("missing internal_handle".to_owned()));
        };

        let public_id = self.registry.register(Some(internal_handle), referrer)?;
        info!(%public_id, referred = referrer.is_some_and(|r| !r.is_empty()), "registered user");

        Ok(Registration {
            public_id,
            join_url: self.join_url(&public_id),
        })
    }

    /// Never fails on bad input: unknown or malformed tokens are echoed back
    /// in a display payload.
    pub fn resolve_join(&self, referrer: Option<&str>) -> AppResult<JoinOutcome> {
        let raw = referrer.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Ok(JoinOutcome::Display("You were invited to join.".to_owned()));
        }

        let known = match PublicId::parse(raw) {
            Some(public_id) => self
                .registry
                .get_user(&public_id.to_string())?
                .map(|user| user.public_id),
            None => None,
        };

        match (self.join_mode, known) {
            (JoinMode::Redirect, Some(public_id)) => Ok(JoinOutcome::Redirect(
                self.profile_view_url.replace("{id}", &public_id.to_string()),
            )),
            (_, Some(public_id)) => Ok(JoinOutcome::Display(format!(
                "You were invited by {public_id}"
            ))),
            (_, None) => Ok(JoinOutcome::Display(format!("You were invited by {raw}"))),
        }
    }

    pub fn fetch_profile(&self, public_id: &str) -> AppResult<ProfileView> {
        let Some(user) = self.registry.get_user(public_id)? else {
            return Err(AppError::NotFound(format!("profile {}", public_id.trim())));
        };
        let referred_by = self
            .registry
            .referred_by(&user.public_id)?
            .map(|r| r.referrer_public_id);

        Ok(ProfileView {
            internal_handle: if self.redact_internal_handle {
                None
            } else {
                user.internal_handle
            },
            public_id: user.public_id,
            created_at: user.created_at,
            referred_by,
        })
    }

    pub fn list_referrals(&self, public_id: &str) -> AppResult<Vec<ReferralView>> {
        let Some(user) = self.registry.get_user(public_id)? else {
            return Err(AppError::NotFound(format!("profile {}", public_id.trim())));
        };

        Ok(self
            .registry
            .referrals_by(&user.public_id.to_string())?
            .into_iter()
            .map(|r| ReferralView {
                new_user_public_id: r.new_user_public_id,
                timestamp: r.timestamp,
            })
            .collect())
    }

    pub fn counts(&self) -> AppResult<RegistryCounts> {
        Ok(self.registry.counts()?)
    }
}
