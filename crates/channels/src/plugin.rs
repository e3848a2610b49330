use {anyhow::Result, async_trait::async_trait};

use yunhu_common::{Element, Session};

use crate::error::Error;

/// Sink for sessions. The host provides the concrete implementation.
///
/// Emission is fire-and-forget: implementations must not block the adapter
/// on downstream processing.
#[async_trait]
pub trait ChannelEventSink: Send + Sync {
    /// Dispatch a session (inbound message, member event, sent message).
    async fn emit(&self, session: Session);

    /// Request disabling a channel account due to a runtime error.
    ///
    /// Used when the webhook listener dies and cannot be restarted.
    async fn request_disable_account(&self, _channel_type: &str, _account_id: &str, _reason: &str) {
    }
}

/// Core channel plugin trait. Each messaging platform implements this.
#[async_trait]
pub trait ChannelPlugin: Send + Sync {
    /// Channel identifier (e.g. "yunhu").
    fn id(&self) -> &str;

    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start an account connection.
    async fn start_account(&mut self, account_id: &str, config: serde_json::Value) -> Result<()>;

    /// Stop an account connection.
    async fn stop_account(&mut self, account_id: &str) -> Result<()>;

    /// Get outbound adapter for sending messages.
    fn outbound(&self) -> Option<&dyn ChannelOutbound>;

    /// Get status adapter for health checks.
    fn status(&self) -> Option<&dyn ChannelStatus>;
}

/// Send messages to a channel.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    /// Encode and send an element tree, returning the platform message ids
    /// of every wire message produced.
    async fn send(
        &self,
        account_id: &str,
        channel_id: &str,
        elements: &[Element],
        reply_to: Option<&str>,
    ) -> Result<Vec<String>>;

    /// Send a single plain-text message.
    async fn send_text(&self, account_id: &str, channel_id: &str, text: &str) -> Result<Vec<String>> {
        self.send(account_id, channel_id, &[Element::text(text)], None)
            .await
    }

    /// Recall (delete) a previously sent message. Unsupported by default.
    async fn recall(&self, _account_id: &str, _channel_id: &str, _message_id: &str) -> Result<()> {
        Err(Error::unsupported("recall").into())
    }
}

/// Probe channel account health.
#[async_trait]
pub trait ChannelStatus: Send + Sync {
    async fn probe(&self, account_id: &str) -> Result<ChannelHealthSnapshot>;
}

/// Channel health snapshot.
#[derive(Debug, Clone)]
pub struct ChannelHealthSnapshot {
    pub connected: bool,
    pub account_id: String,
    pub details: Option<String>,
}
