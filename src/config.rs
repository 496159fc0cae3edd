//! Runtime configuration, read from the environment (and `.env`).
//!
//! Every field has a default so a bare `cargo run` serves on port 3000.

use std::{net::SocketAddr, str::FromStr};

/// One year.
const MAX_SESSION_IDLE_MINUTES: i64 = 60 * 24 * 365;

/// What `/join` answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Redirect known referrers to their profile view.
    Redirect,
    /// Always answer with a plain acknowledgment naming the referrer.
    Display,
}

impl FromStr for JoinMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redirect" => Ok(JoinMode::Redirect),
            "display" => Ok(JoinMode::Display),
            other => Err(format!("unknown join mode {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Env: `HTTP_ADDR`. Default `0.0.0.0:3000`.
    pub http_addr: SocketAddr,

    /// Prefix of shareable join links.
    /// Env: `PUBLIC_BASE_URL`. Default `http://localhost:3000`.
    pub public_base_url: String,

    /// Redirect target for `/join`; `{id}` is replaced with the public id.
    /// Env: `PROFILE_VIEW_URL`. Default `/api/profile/{id}`.
    pub profile_view_url: String,

    /// Env: `JOIN_MODE` (`redirect` or `display`). Default `redirect`.
    pub join_mode: JoinMode,

    /// Hide `internal_handle` from profile responses.
    /// Env: `REDACT_INTERNAL_HANDLE`. Default `false`.
    pub redact_internal_handle: bool,

    /// Env: `SESSION_IDLE_MINUTES`, between 1 and one year. Default `5`.
    pub session_idle_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 3000).into(),
            public_base_url: "http://localhost:3000".to_owned(),
            profile_view_url: "/api/profile/{id}".to_owned(),
            join_mode: JoinMode::Redirect,
            redact_internal_handle: false,
            session_idle_minutes: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            parse_into(&mut config.http_addr, "HTTP_ADDR", &addr);
        }

        if let Some(url) = lookup("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_owned();
        }

        if let Some(url) = lookup("PROFILE_VIEW_URL") {
            if url.contains("{id}") {
                config.profile_view_url = url;
            } else {
                tracing::warn!(value = %url, "PROFILE_VIEW_URL has no {{id}}, using default");
            }
        }

        if let Some(mode) = lookup("JOIN_MODE") {
            parse_into(&mut config.join_mode, "JOIN_MODE", &mode);
        }

        if let Some(val) = lookup("REDACT_INTERNAL_HANDLE") {
            config.redact_internal_handle = val == "true" || val == "1";
        }

        if let Some(val) = lookup("SESSION_IDLE_MINUTES") {
            match val.trim().parse::<i64>() {
                Ok(minutes) if (1..=MAX_SESSION_IDLE_MINUTES).contains(&minutes) => {
                    config.session_idle_minutes = minutes;
                }
                _ => tracing::warn!(
                    value = %val,
                    max = MAX_SESSION_IDLE_MINUTES,
                    "SESSION_IDLE_MINUTES out of range, using default"
                ),
            }
        }

        config
    }
}

fn parse_into<T: FromStr>(slot: &mut T, key: &str, value: &str) {
    match value.trim().parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => tracing::warn!(key, value, "invalid value, using default"),
    }
}
