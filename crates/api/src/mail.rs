//! Account email over SMTP.
//!
//! With `SMTP_HOST` unset the [`Mailer`] runs in log-only mode: the message
//! is written to the trace log instead of sent, which is what local
//! development and the test suite rely on.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(#[from] lettre::error::Error),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_ADDRESS: &str = "Meowl <noreply@meowl.local>";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// `None` if `SMTP_HOST` is not set.
    ///
    /// | Variable        | Default                        |
    /// |-----------------|--------------------------------|
    /// | `SMTP_HOST`     | --                             |
    /// | `SMTP_PORT`     | `587`                          |
    /// | `SMTP_FROM`     | `Meowl <noreply@meowl.local>`  |
    /// | `SMTP_USER`     | --                             |
    /// | `SMTP_PASSWORD` | --                             |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok().filter(|h| !h.is_empty())?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .map(|p| p.parse().expect("SMTP_PORT must be a valid u16"))
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

pub struct Mailer {
    config: Option<EmailConfig>,
}

impl Mailer {
    pub fn new(config: Option<EmailConfig>) -> Self {
        Self { config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub async fn send_verification(
        &self,
        to_email: &str,
        username: &str,
        link: &str,
    ) -> Result<(), MailError> {
        let subject = "Confirm your Meowl account";
        let body = format!(
            "Hi {username},\n\n\
             Open this link to confirm your email address:\n\n{link}\n\n\
             If you did not sign up for Meowl you can ignore this message.\n"
        );
        self.send(to_email, subject, body).await
    }

    async fn send(&self, to_email: &str, subject: &str, body: String) -> Result<(), MailError> {
        let Some(config) = &self.config else {
            tracing::info!(to = to_email, subject, body = %body, "SMTP not configured, email logged");
            return Ok(());
        };

        let email = Message::builder()
            .from(config.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        let mut transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            transport = transport.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport.build().send(email).await?;
        tracing::info!(to = to_email, subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_only_mailer_succeeds() {
        let mailer = Mailer::new(None);
        assert!(!mailer.is_configured());
        mailer
            .send_verification("cat@example.com", "cat", "http://localhost/verify")
            .await
            .unwrap();
    }

    #[test]
    fn address_errors_are_reported() {
        let err: MailError = "not-an-email".parse::<lettre::Address>().unwrap_err().into();
        assert!(err.to_string().contains("Email address parse error"));
    }
}
