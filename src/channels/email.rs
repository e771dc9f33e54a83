//! Email channel — outbound SMTP via lettre.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::channels::{DeliveryChannel, DeliveryOutcome};
use crate::error::ChannelError;

// ── Configuration ───────────────────────────────────────────────────

/// Email channel configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl EmailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `SMTP_HOST` is not set (channel disabled).
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;

        let smtp_port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("SMTP_PASSWORD").unwrap_or_default());
        let from_address = std::env::var("SMTP_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
        })
    }
}

// ── Channel ─────────────────────────────────────────────────────────

/// Email channel — SMTP outbound.
pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_transport(&self) -> Result<SmtpTransport, ChannelError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        Ok(SmtpTransport::relay(&self.config.smtp_host)
            .map_err(|e| ChannelError::SendFailed {
                name: "email".into(),
                reason: format!("SMTP relay error: {e}"),
            })?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build())
    }

    fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<String, ChannelError> {
        let transport = self.build_transport()?;

        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.config.smtp_host);

        let email = Message::builder()
            .from(self.config.from_address.parse().map_err(|e| {
                ChannelError::InvalidRecipient {
                    name: "email".into(),
                    reason: format!("Invalid from address: {e}"),
                }
            })?)
            .to(to.parse().map_err(|e| ChannelError::InvalidRecipient {
                name: "email".into(),
                reason: format!("Invalid to address: {e}"),
            })?)
            .subject(subject)
            .message_id(Some(message_id.clone()))
            .body(body.to_string())
            .map_err(|e| ChannelError::SendFailed {
                name: "email".into(),
                reason: format!("Failed to build email: {e}"),
            })?;

        transport
            .send(&email)
            .map_err(|e| ChannelError::SendFailed {
                name: "email".into(),
                reason: format!("SMTP send failed: {e}"),
            })?;

        tracing::info!("Email sent to {to}");
        Ok(message_id)
    }
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryOutcome, ChannelError> {
        // lettre's SmtpTransport is blocking; keep it off the async runtime.
        let channel = EmailChannel {
            config: self.config.clone(),
        };
        let recipient = recipient.to_string();
        let subject = subject.to_string();
        let body = body.to_string();

        let message_id = tokio::task::spawn_blocking(move || {
            channel.send_email(&recipient, &subject, &body)
        })
        .await
        .map_err(|e| ChannelError::SendFailed {
            name: "email".into(),
            reason: format!("send task failed: {e}"),
        })??;

        Ok(DeliveryOutcome::sent(message_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            username: "sender@example.com".into(),
            password: SecretString::from("secret"),
            from_address: "sender@example.com".into(),
        }
    }

    #[test]
    fn invalid_recipient_is_rejected_before_transport() {
        let channel = EmailChannel::new(config());
        let result = channel.send_email("not an address", "Hi", "Body");
        assert!(matches!(result, Err(ChannelError::InvalidRecipient { .. })));
    }

    #[test]
    fn from_env_disabled_without_host() {
        // SMTP_HOST unset in the test environment.
        if std::env::var("SMTP_HOST").is_err() {
            assert!(EmailConfig::from_env().is_none());
        }
    }
}
