//! Signed, time-limited capability tokens.
//!
//! A token binds a resource key (a Meowl slug, a user id, ...) to the moment
//! it was issued:
//!
//! ```text
//! base64url("{issued_at_unix}:{key}") "." base64url(HMAC-SHA256(secret, "{purpose}|{payload}"))
//! ```
//!
//! The purpose tag is part of the signed material, so a QR token can never be
//! replayed as an access pass or an email-verification token. Validation
//! collapses every failure (bad encoding, bad signature, wrong purpose,
//! expiry) into `None`; callers must not be able to tell them apart.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Duration;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::Timestamp;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of QR tokens and access passes.
pub const DEFAULT_MAX_AGE_MINUTES: i64 = 15;

/// Tokens stamped slightly in the future (clock drift between app servers)
/// are still accepted within this window.
const CLOCK_SKEW_SECS: i64 = 60;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    /// Printed on the QR poster; grants first access to a Meowl.
    Qr,
    /// Issued after a successful QR check; lets the holder revisit the Meowl.
    Pass,
    /// Embedded in signup email links.
    Email,
}

impl TokenPurpose {
    fn tag(self) -> &'static str {
        match self {
            TokenPurpose::Qr => "qr",
            TokenPurpose::Pass => "pass",
            TokenPurpose::Email => "email",
        }
    }
}

/// Issues and validates signed tokens with a shared secret.
#[derive(Clone)]
pub struct TokenGate {
    secret: Vec<u8>,
    max_age: Duration,
}

impl std::fmt::Debug for TokenGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGate")
            .field("secret", &"[REDACTED]")
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl TokenGate {
    pub fn new(secret: impl AsRef<[u8]>, max_age_minutes: i64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            max_age: Duration::minutes(max_age_minutes),
        }
    }

    /// Lifetime applied by [`TokenGate::validate`].
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Produce a token for `key`, stamped with `now`.
    pub fn issue(&self, purpose: TokenPurpose, key: &str, now: Timestamp) -> String {
        let payload = format!("{}:{key}", now.timestamp());
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        let signature = self.mac(purpose, &payload_b64).finalize().into_bytes();
        format!("{payload_b64}.{}", URL_SAFE_NO_PAD.encode(signature))
    }

    /// Validate with the gate's configured max age.
    pub fn validate(&self, purpose: TokenPurpose, token: &str, now: Timestamp) -> Option<String> {
        self.validate_with_max_age(purpose, token, self.max_age, now)
    }

    /// Return the original key if the signature matches and the token is at
    /// most `max_age` old.
    pub fn validate_with_max_age(
        &self,
        purpose: TokenPurpose,
        token: &str,
        max_age: Duration,
        now: Timestamp,
    ) -> Option<String> {
        let (payload_b64, signature_b64) = token.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;

        // Constant-time comparison.
        self.mac(purpose, payload_b64).verify_slice(&signature).ok()?;

        let payload = String::from_utf8(URL_SAFE_NO_PAD.decode(payload_b64).ok()?).ok()?;
        let (issued_at, key) = payload.split_once(':')?;
        let issued_at: i64 = issued_at.parse().ok()?;

        let elapsed = now.timestamp() - issued_at;
        if elapsed < -CLOCK_SKEW_SECS || elapsed > max_age.num_seconds() {
            return None;
        }
        Some(key.to_string())
    }

    fn mac(&self, purpose: TokenPurpose, payload_b64: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(purpose.tag().as_bytes());
        mac.update(b"|");
        mac.update(payload_b64.as_bytes());
        mac
    }
}
