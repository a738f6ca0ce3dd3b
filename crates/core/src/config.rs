//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services. Services
//! never read process-wide environment variables during request handling, which keeps behaviour
//! consistent across threads and test harnesses.

use crate::constants::DEFAULT_TOKEN_TTL_DAYS;
use crate::{ClinicError, ClinicResult};
use chrono::Duration;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone)]
pub struct CoreConfig {
    db_file: PathBuf,
    jwt_secret: String,
    token_ttl: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidConfig`] if the signing secret is blank or the token
    /// lifetime is not positive.
    pub fn new(db_file: PathBuf, jwt_secret: String, token_ttl_days: i64) -> ClinicResult<Self> {
        if jwt_secret.trim().is_empty() {
            return Err(ClinicError::InvalidConfig(
                "JWT_SECRET cannot be empty".into(),
            ));
        }
        if token_ttl_days <= 0 {
            return Err(ClinicError::InvalidConfig(
                "token lifetime must be a positive number of days".into(),
            ));
        }

        Ok(Self {
            db_file,
            jwt_secret,
            token_ttl: Duration::days(token_ttl_days),
        })
    }

    pub fn db_file(&self) -> &Path {
        &self.db_file
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("db_file", &self.db_file)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

/// Parse the token lifetime (in days) from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_TOKEN_TTL_DAYS`].
pub fn token_ttl_days_from_env_value(value: Option<String>) -> ClinicResult<i64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_TOKEN_TTL_DAYS),
        Some(v) => v.parse::<i64>().map_err(|_| {
            ClinicError::InvalidConfig(format!("JWT_TTL_DAYS must be an integer, got '{v}'"))
        }),
    }
}
