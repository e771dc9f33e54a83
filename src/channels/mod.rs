//! Delivery channels for outbound messages.
//!
//! Channels are pure I/O, no business logic. Skip decisions, personalization,
//! and interaction logging live in the orchestrator; a channel takes a
//! rendered message and reports a `DeliveryOutcome`. Transport failures are
//! returned in the outcome, never retried here.

pub mod email;
pub mod log;
pub mod slack;

pub use email::{EmailChannel, EmailConfig};
pub use log::LogChannel;
pub use slack::SlackChannel;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Which transport a message goes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Slack,
    Log,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Slack => "slack",
            ChannelKind::Log => "log",
        }
    }
}

impl std::str::FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(ChannelKind::Email),
            "slack" => Ok(ChannelKind::Slack),
            "log" => Ok(ChannelKind::Log),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    /// Provider-assigned message id, when delivery succeeded.
    pub provider_id: Option<String>,
    /// Failure reason, when delivery failed.
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn sent(provider_id: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_id: Some(provider_id.into()),
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_id: None,
            error: Some(reason.into()),
        }
    }
}

/// Trait for delivery channels.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Channel name (e.g. "email", "slack").
    fn name(&self) -> &str;

    /// Send a rendered message to a recipient.
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryOutcome, ChannelError>;
}

/// Routes a send to the channel registered for its kind.
pub struct Dispatcher {
    channels: HashMap<ChannelKind, Arc<dyn DeliveryChannel>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel for a kind, replacing any previous registration.
    pub fn register(&mut self, kind: ChannelKind, channel: Arc<dyn DeliveryChannel>) {
        self.channels.insert(kind, channel);
    }

    pub fn supports(&self, kind: ChannelKind) -> bool {
        self.channels.contains_key(&kind)
    }

    /// Dispatch a message. Transport errors come back as a failed outcome so
    /// the caller can record them; only a missing registration is an `Err`.
    pub async fn send(
        &self,
        kind: ChannelKind,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryOutcome, ChannelError> {
        let channel = self
            .channels
            .get(&kind)
            .ok_or_else(|| ChannelError::Unsupported {
                kind: kind.to_string(),
            })?;

        match channel.send(recipient, subject, body).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(channel = channel.name(), %recipient, "Delivery failed: {e}");
                Ok(DeliveryOutcome::failed(e.to_string()))
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_kind_parses_case_insensitive() {
        assert_eq!("Email".parse::<ChannelKind>().unwrap(), ChannelKind::Email);
        assert_eq!("slack".parse::<ChannelKind>().unwrap(), ChannelKind::Slack);
        assert!("carrier_pigeon".parse::<ChannelKind>().is_err());
    }

    #[tokio::test]
    async fn dispatch_to_unregistered_kind_errors() {
        let dispatcher = Dispatcher::new();
        let result = dispatcher.send(ChannelKind::Email, "a@b.co", "hi", "body").await;
        assert!(matches!(result, Err(ChannelError::Unsupported { .. })));
    }

    #[tokio::test]
    async fn dispatch_routes_to_registered_channel() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(ChannelKind::Log, Arc::new(LogChannel::new()));
        let outcome = dispatcher
            .send(ChannelKind::Log, "a@b.co", "hi", "body")
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.provider_id.is_some());
    }
}
