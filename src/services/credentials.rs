//! Password hashing and session tokens

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use chrono::{Duration, Utc};

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{Role, UserClaims},
};

#[derive(Clone)]
pub struct Credentials {
    secret: String,
    ttl: Duration,
    params: Params,
}

impl Credentials {
    pub fn new(config: &AuthConfig) -> AppResult<Self> {
        let params = Params::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Invalid password hashing parameters: {}", e)))?;

        Ok(Self {
            secret: config.jwt_secret.clone(),
            ttl: Duration::minutes(config.token_ttl_minutes),
            params,
        })
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password using Argon2id with a fresh salt
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// False on mismatch and on a malformed stored hash
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .hasher()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                false
            }
        }
    }

    /// Sign a session token for `subject`
    pub fn issue_token(&self, subject: &str, role: Role) -> AppResult<(String, UserClaims)> {
        let now = Utc::now();
        let claims = UserClaims {
            sub: subject.to_string(),
            role,
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };

        let token = claims
            .create_token(&self.secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;
        Ok((token, claims))
    }

    /// Verify a session token. Fails with `Authentication` on a bad token and
    /// with `Authorization` on a role that may not hold a session.
    pub fn parse_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.secret)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret".to_string(),
        hash_memory_kib: 8,
        hash_iterations: 1,
        hash_parallelism: 1,
        ..AuthConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let credentials = Credentials::new(&test_config()).unwrap();
        let hash = credentials.hash_password("hunter2").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(credentials.verify_password("hunter2", &hash));
        assert!(!credentials.verify_password("hunter3", &hash));
    }

    #[test]
    fn test_same_password_gets_distinct_hashes() {
        let credentials = Credentials::new(&test_config()).unwrap();
        let first = credentials.hash_password("pw").unwrap();
        let second = credentials.hash_password("pw").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_hash_is_a_mismatch() {
        let credentials = Credentials::new(&test_config()).unwrap();
        assert!(!credentials.verify_password("pw", "plaintext-from-an-old-import"));
        assert!(!credentials.verify_password("pw", ""));
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let config = AuthConfig {
            hash_memory_kib: 0,
            ..test_config()
        };
        assert!(matches!(Credentials::new(&config), Err(AppError::Internal(_))));
    }

    #[test]
    fn test_token_round_trip() {
        let credentials = Credentials::new(&test_config()).unwrap();
        let (token, issued) = credentials.issue_token("john@x.com", Role::Admin).unwrap();

        let parsed = tokio_test::assert_ok!(credentials.parse_token(&token));
        assert_eq!(parsed, issued);
        assert_eq!(parsed.sub, "john@x.com");
        assert_eq!(parsed.role, Role::Admin);
        assert_eq!(parsed.exp - parsed.iat, 5 * 60);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = AuthConfig {
            token_ttl_minutes: -1,
            ..test_config()
        };
        let credentials = Credentials::new(&config).unwrap();
        let (token, _) = credentials.issue_token("john@x.com", Role::User).unwrap();

        let err = tokio_test::assert_err!(credentials.parse_token(&token));
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let ours = Credentials::new(&test_config()).unwrap();
        let theirs = Credentials::new(&AuthConfig {
            jwt_secret: "someone-else".to_string(),
            ..test_config()
        })
        .unwrap();

        let (token, _) = theirs.issue_token("john@x.com", Role::Admin).unwrap();
        assert!(matches!(ours.parse_token(&token), Err(AppError::Authentication(_))));
        assert!(matches!(ours.parse_token("not.a.jwt"), Err(AppError::Authentication(_))));
    }
}
