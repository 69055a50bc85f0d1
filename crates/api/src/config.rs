use meowl_core::email_link::DEFAULT_EMAIL_TOKEN_HOURS;
use meowl_core::policy::{
    Policy, PointsPolicy, DEFAULT_POINTS_CREATE, DEFAULT_POINTS_SCAN, DEFAULT_POINTS_VERIFY,
    DEFAULT_VERIFICATION_QUORUM,
};
use meowl_core::token_gate::DEFAULT_MAX_AGE_MINUTES;

use crate::auth::jwt::JwtConfig;
use crate::mail::EmailConfig;

/// Default minimum password length for signup.
const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;

/// Server configuration loaded from environment variables.
///
/// Everything except the two secrets has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// Key for QR tokens, access passes, email links and client hashes.
    pub signing_secret: String,
    /// Public origin used when building QR and email links.
    pub site_url: String,
    /// Lifetime of QR tokens and access passes.
    pub qr_token_minutes: i64,
    pub email_token_hours: i64,
    pub password_min_length: usize,
    pub policy: Policy,
    /// `None` when `SMTP_HOST` is unset; links are logged instead of mailed.
    pub email: Option<EmailConfig>,
}

pub(crate) fn env_or<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + ToString,
{
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>()))
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                  |
    /// |----------------------------------|--------------------------|
    /// | `HOST`                           | `0.0.0.0`                |
    /// | `PORT`                           | `3000`                   |
    /// | `CORS_ORIGINS`                   | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`           | `30`                     |
    /// | `SIGNING_SECRET`                 | **required**             |
    /// | `SITE_URL`                       | `http://localhost:5173`  |
    /// | `QR_TOKEN_MINUTES`               | `15`                     |
    /// | `EMAIL_TOKEN_HOURS`              | `72`                     |
    /// | `PASSWORD_MIN_LENGTH`            | `8`                      |
    /// | `POINTS_SCAN`                    | `5`                      |
    /// | `POINTS_VERIFY`                  | `10`                     |
    /// | `POINTS_CREATE`                  | `20`                     |
    /// | `VERIFICATION_QUORUM`            | `2`                      |
    /// | `LEADERBOARD_EXCLUDE_SUSPENDED`  | `true`                   |
    ///
    /// # Panics
    ///
    /// Panics on a missing secret or any malformed value.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_or("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", 30);

        let signing_secret =
            std::env::var("SIGNING_SECRET").expect("SIGNING_SECRET must be set in the environment");
        assert!(!signing_secret.is_empty(), "SIGNING_SECRET must not be empty");

        let site_url = std::env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:5173".into());

        let qr_token_minutes: i64 = env_or("QR_TOKEN_MINUTES", DEFAULT_MAX_AGE_MINUTES);
        assert!(qr_token_minutes > 0, "QR_TOKEN_MINUTES must be positive");
        let email_token_hours: i64 = env_or("EMAIL_TOKEN_HOURS", DEFAULT_EMAIL_TOKEN_HOURS);

        let verification_quorum: i64 = env_or("VERIFICATION_QUORUM", DEFAULT_VERIFICATION_QUORUM);
        assert!(verification_quorum >= 1, "VERIFICATION_QUORUM must be at least 1");

        let policy = Policy {
            points: PointsPolicy {
                scan: env_or("POINTS_SCAN", DEFAULT_POINTS_SCAN),
                verify: env_or("POINTS_VERIFY", DEFAULT_POINTS_VERIFY),
                create: env_or("POINTS_CREATE", DEFAULT_POINTS_CREATE),
            },
            verification_quorum,
            leaderboard_exclude_suspended: env_or("LEADERBOARD_EXCLUDE_SUSPENDED", true),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            signing_secret,
            site_url,
            qr_token_minutes,
            email_token_hours,
            password_min_length: env_or("PASSWORD_MIN_LENGTH", DEFAULT_PASSWORD_MIN_LENGTH),
            policy,
            email: EmailConfig::from_env(),
        }
    }
}
