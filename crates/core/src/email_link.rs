//! Signup email verification links.
//!
//! The token key binds both the user id and the address, so changing the
//! email invalidates links already sent.

use chrono::Duration;

use crate::token_gate::{TokenGate, TokenPurpose};
use crate::types::{DbId, Timestamp};

pub const DEFAULT_EMAIL_TOKEN_HOURS: i64 = 72;

fn token_key(user_id: DbId, email: &str) -> String {
    format!("{user_id}:{}", email.trim().to_lowercase())
}

pub fn issue_email_token(gate: &TokenGate, user_id: DbId, email: &str, now: Timestamp) -> String {
    gate.issue(TokenPurpose::Email, &token_key(user_id, email), now)
}

pub fn verify_email_token(
    gate: &TokenGate,
    token: &str,
    user_id: DbId,
    email: &str,
    max_age_hours: i64,
    now: Timestamp,
) -> bool {
    gate.validate_with_max_age(TokenPurpose::Email, token, Duration::hours(max_age_hours), now)
        .is_some_and(|key| key == token_key(user_id, email))
}

pub fn verification_link(site_url: &str, user_id: DbId, token: &str) -> String {
    format!(
        "{}/api/v1/auth/verify-email/{user_id}/{token}",
        site_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn token_is_bound_to_user_and_address() {
        let gate = TokenGate::new("secret", 15);
        let now = Utc::now();
        let token = issue_email_token(&gate, 7, "Cat@Example.com", now);

        assert!(verify_email_token(&gate, &token, 7, "cat@example.com", 72, now));
        assert!(!verify_email_token(&gate, &token, 8, "cat@example.com", 72, now));
        assert!(!verify_email_token(&gate, &token, 7, "dog@example.com", 72, now));
    }

    #[test]
    fn token_outlives_the_qr_window_but_not_its_own() {
        let gate = TokenGate::new("secret", 15);
        let now = Utc::now();
        let token = issue_email_token(&gate, 7, "cat@example.com", now - Duration::hours(48));
        assert!(verify_email_token(&gate, &token, 7, "cat@example.com", 72, now));

        let stale = issue_email_token(&gate, 7, "cat@example.com", now - Duration::hours(73));
        assert!(!verify_email_token(&gate, &stale, 7, "cat@example.com", 72, now));
    }

    #[test]
    fn link_format() {
        assert_eq!(
            verification_link("https://meowl.example/", 3, "tok"),
            "https://meowl.example/api/v1/auth/verify-email/3/tok"
        );
    }
}
