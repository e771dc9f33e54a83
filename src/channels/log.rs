//! Log channel — writes messages to the log instead of sending them.
//!
//! Useful for demos and as the delivery target when no real transport is
//! configured.

use async_trait::async_trait;
use uuid::Uuid;

use crate::channels::{DeliveryChannel, DeliveryOutcome};
use crate::error::ChannelError;

pub struct LogChannel;

impl LogChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryOutcome, ChannelError> {
        let message_id = format!("log_{}", Uuid::new_v4());
        tracing::info!(%recipient, %subject, %message_id, "Logged outbound message");
        tracing::debug!(%body, "Message body");
        Ok(DeliveryOutcome::sent(message_id))
    }
}
