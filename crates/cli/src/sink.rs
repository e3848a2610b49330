use {
    async_trait::async_trait,
    tracing::{info, warn},
};

use {yunhu_channels::ChannelEventSink, yunhu_common::Session};

/// Event sink that writes every session to the log.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl ChannelEventSink for LogSink {
    async fn emit(&self, session: Session) {
        match serde_json::to_string(&session) {
            Ok(json) => info!(
                kind = ?session.kind,
                channel_id = ?session.channel_id,
                user_id = ?session.user_id(),
                session = %json,
                "session"
            ),
            Err(e) => warn!(error = %e, "failed to serialize session"),
        }
    }

    async fn request_disable_account(&self, channel_type: &str, account_id: &str, reason: &str) {
        warn!(channel_type, account_id, reason, "channel account requested disable");
    }
}
