//! Slack channel — posts messages via the Slack Web API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::{DeliveryChannel, DeliveryOutcome};
use crate::error::ChannelError;

const SLACK_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Slack channel — chat.postMessage with a bot token.
pub struct SlackChannel {
    bot_token: SecretString,
    client: reqwest::Client,
    api_url: String,
}

impl SlackChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
            api_url: SLACK_POST_MESSAGE_URL.to_string(),
        }
    }

    /// Build from environment. Returns `None` if `SLACK_BOT_TOKEN` is not set
    /// (channel disabled).
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("SLACK_BOT_TOKEN").ok()?;
        Some(Self::new(SecretString::from(token)))
    }

    /// Override the API endpoint (tests).
    #[cfg(test)]
    fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.to_string();
        self
    }
}

#[async_trait]
impl DeliveryChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryOutcome, ChannelError> {
        // Slack has no subject line; a non-empty subject becomes a bold lead-in.
        let text = if subject.is_empty() {
            body.to_string()
        } else {
            format!("*{subject}*\n{body}")
        };

        let payload = serde_json::json!({
            "channel": recipient,
            "text": text,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.bot_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "slack".into(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ChannelError::SendFailed {
                name: "slack".into(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let parsed: PostMessageResponse =
            response.json().await.map_err(|e| ChannelError::SendFailed {
                name: "slack".into(),
                reason: format!("Invalid API response: {e}"),
            })?;

        if !parsed.ok {
            let reason = parsed.error.unwrap_or_else(|| "unknown error".to_string());
            if reason == "invalid_auth" || reason == "not_authed" {
                return Err(ChannelError::AuthFailed {
                    name: "slack".into(),
                });
            }
            return Err(ChannelError::SendFailed {
                name: "slack".into(),
                reason,
            });
        }

        tracing::info!(channel = %recipient, "Slack message sent");
        Ok(DeliveryOutcome::sent(
            parsed.ts.unwrap_or_else(|| "unknown".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_error_response() {
        let raw = r#"{"ok":false,"error":"channel_not_found"}"#;
        let parsed: PostMessageResponse = serde_json::from_str(raw).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.error.as_deref(), Some("channel_not_found"));
    }

    #[test]
    fn parses_ok_response() {
        let raw = r#"{"ok":true,"ts":"1712345678.000100"}"#;
        let parsed: PostMessageResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.ok);
        assert_eq!(parsed.ts.as_deref(), Some("1712345678.000100"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_send_failed() {
        let channel = SlackChannel::new(SecretString::from("xoxb-test"))
            .with_api_url("http://127.0.0.1:1/unreachable");
        let result = channel.send("C123", "Hi", "Body").await;
        assert!(matches!(result, Err(ChannelError::SendFailed { .. })));
    }
}
