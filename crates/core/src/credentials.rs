//! Password hashing and bearer tokens.
//!
//! Passwords are stored as Argon2id PHC strings (`$argon2id$v=19$m=…`), so the parameters used
//! for a given hash travel with it and verification keeps working if the defaults change.
//!
//! Bearer tokens are HS256 JWTs whose `sub` claim is the user's [`RecordId`]. They carry no role
//! or profile data: every request re-resolves the user from the store, which is what makes a
//! deleted account stop working immediately.

use crate::config::CoreConfig;
use crate::{ClinicError, ClinicResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{Duration, Utc};
use clinic_uuid::RecordId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims carried by an issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Hashes/verifies passwords and issues/verifies bearer tokens.
#[derive(Clone)]
pub struct Credentials {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    hash_params: Params,
}

impl Credentials {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            hash_params: Params::default(),
        }
    }

    pub fn from_config(cfg: &CoreConfig) -> Self {
        Self::new(cfg.jwt_secret().as_bytes(), cfg.token_ttl())
    }

    /// Overrides the Argon2 cost parameters used for new hashes.
    pub fn with_hash_params(mut self, params: Params) -> Self {
        self.hash_params = params;
        self
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.hash_params.clone())
    }

    pub fn hash_password(&self, password: &str) -> ClinicResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ClinicError::PasswordHash(e.to_string()))
    }

    /// Returns `true` only if `password` matches `stored_hash`.
    ///
    /// A malformed stored hash counts as a mismatch.
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => self
                .hasher()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!("stored password hash is malformed: {}", e);
                false
            }
        }
    }

    pub fn issue(&self, user_id: &RecordId) -> ClinicResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(ClinicError::TokenIssue)
    }

    /// Verifies a token's signature and expiry and returns the user id it names.
    ///
    /// Every failure is reported as the same [`ClinicError::Auth`].
    pub fn verify(&self, token: &str) -> ClinicResult<RecordId> {
        let mut validation = Validation::default();
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!("token rejected: {}", e);
            ClinicError::auth("Not authorized, token invalid")
        })?;

        RecordId::parse(&data.claims.sub)
            .map_err(|_| ClinicError::auth("Not authorized, token invalid"))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("ttl", &self.ttl)
            .field("hash_params", &self.hash_params)
            .finish_non_exhaustive()
    }
}

/// Cheap Argon2 parameters for unit tests; production uses the crate defaults.
#[cfg(test)]
pub(crate) fn test_credentials() -> Credentials {
    let params = Params::new(Params::MIN_M_COST, 1, 1, None).expect("valid argon2 params");
    Credentials::new(b"test-secret", Duration::days(1)).with_hash_params(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let credentials = test_credentials();
        let hash = credentials.hash_password("DoctorPass123").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(credentials.verify_password("DoctorPass123", &hash));
        assert!(!credentials.verify_password("doctorpass123", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let credentials = test_credentials();
        let a = credentials.hash_password("same").unwrap();
        let b = credentials.hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let credentials = test_credentials();
        assert!(!credentials.verify_password("anything", "plaintext"));
    }

    #[test]
    fn test_issue_then_verify_returns_subject() {
        let credentials = test_credentials();
        let id = RecordId::new();

        let token = credentials.issue(&id).unwrap();
        assert_eq!(credentials.verify(&token).unwrap(), id);
    }

    #[test]
    fn test_verify_rejects_foreign_signature() {
        let ours = test_credentials();
        let theirs = Credentials::new(b"another-secret", Duration::days(1));
        let token = theirs.issue(&RecordId::new()).unwrap();

        let err = ours.verify(&token).unwrap_err();
        assert!(matches!(err, ClinicError::Auth(_)));
    }

    #[test]
    fn test_verify_rejects_expired_and_garbage_tokens() {
        let expired = Credentials::new(b"test-secret", Duration::days(-2));
        let token = expired.issue(&RecordId::new()).unwrap();

        assert!(matches!(
            test_credentials().verify(&token),
            Err(ClinicError::Auth(_))
        ));
        assert!(matches!(
            test_credentials().verify("not.a.jwt"),
            Err(ClinicError::Auth(_))
        ));
    }
}
