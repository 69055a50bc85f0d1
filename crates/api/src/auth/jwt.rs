//! Access tokens and refresh tokens.
//!
//! Access tokens are short-lived HS256 JWTs. Refresh tokens are opaque UUIDs;
//! only their SHA-256 digest is persisted, and each use rotates the session.

use chrono::Duration;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use meowl_core::hashing::sha256_hex;
use meowl_core::roles::Role;
use meowl_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::env_or;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// The user's database id.
    pub sub: DbId,
    /// Role at issue time. Authorization re-reads the role from the database.
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_mins: i64,
    pub refresh_token_expiry_days: i64,
}

const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 14;

impl JwtConfig {
    /// `JWT_SECRET` is required; lifetimes default to 15 minutes and 14 days.
    ///
    /// # Panics
    ///
    /// On a missing or empty secret, or a malformed or non-positive lifetime.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        assert!(!secret.is_empty(), "JWT_SECRET must be set");

        let config = Self {
            secret,
            access_token_expiry_mins: env_or("JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS),
            refresh_token_expiry_days: env_or("JWT_REFRESH_EXPIRY_DAYS", DEFAULT_REFRESH_EXPIRY_DAYS),
        };
        assert!(
            config.access_token_expiry_mins > 0 && config.refresh_token_expiry_days > 0,
            "JWT lifetimes must be positive"
        );
        config
    }

    pub fn refresh_expires_at(&self, now: Timestamp) -> Timestamp {
        now + Duration::days(self.refresh_token_expiry_days)
    }
}

pub fn generate_access_token(
    user_id: DbId,
    role: Role,
    config: &JwtConfig,
    now: Timestamp,
) -> Result<String, jsonwebtoken::errors::Error> {
    let iat = now.timestamp();
    let claims = Claims {
        sub: user_id,
        role,
        exp: iat + config.access_token_expiry_mins * 60,
        iat,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Checks signature and expiry.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// A freshly minted refresh token. `plaintext` goes to the client once.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub plaintext: String,
    pub hash: String,
}

impl RefreshToken {
    pub fn generate() -> Self {
        let plaintext = Uuid::new_v4().to_string();
        let hash = hash_refresh_token(&plaintext);
        Self { plaintext, hash }
    }
}

pub fn hash_refresh_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 14,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let config = test_config();
        let token = generate_access_token(42, Role::Staff, &config, Utc::now()).unwrap();

        let claims = validate_token(&token, &config).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Staff);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_expired_token_fails() {
        let config = test_config();
        // Well past the default 60 second leeway.
        let issued = Utc::now() - Duration::minutes(30);
        let token = generate_access_token(1, Role::Member, &config, issued).unwrap();

        assert!(validate_token(&token, &config).is_err());
    }

    #[test]
    fn test_other_secret_fails() {
        let config = test_config();
        let token = generate_access_token(1, Role::Member, &config, Utc::now()).unwrap();
        let other = JwtConfig {
            secret: "a-different-secret".to_string(),
            ..config
        };

        assert!(validate_token(&token, &other).is_err());
    }

    #[test]
    fn test_refresh_tokens_are_unique_and_hashed() {
        let a = RefreshToken::generate();
        let b = RefreshToken::generate();

        assert_ne!(a.plaintext, b.plaintext);
        assert_eq!(a.hash, hash_refresh_token(&a.plaintext));
        assert_eq!(a.hash.len(), 64);
    }
}
