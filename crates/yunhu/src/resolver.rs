//! Collaborators the encoder and decoder call out to.
//!
//! Each lookup is a trait so the translation engine can run against the
//! HTTP client in production and against in-memory fakes in tests.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    wire::{RawMessage, SendPayload},
};

/// An uploaded image: the key for `imageKey` and its public URL for inline
/// markdown/html embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub key: String,
    pub url: String,
}

/// Uploads media referenced by source (URL, data URI or path) and returns
/// the platform key.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn upload_image(&self, src: &str) -> Result<UploadedImage>;
    async fn upload_video(&self, src: &str) -> Result<String>;
    async fn upload_file(&self, src: &str) -> Result<String>;
    /// Audio is delivered as video; returns a video key.
    async fn upload_audio(&self, src: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
}

#[async_trait]
pub trait MentionResolver: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<UserProfile>;
}

#[async_trait]
pub trait QuoteResolver: Send + Sync {
    /// Fetch a message by id, `None` when the chat has no such message.
    async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<Option<RawMessage>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub msg_id: String,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, payload: &SendPayload) -> Result<SentMessage>;
}

/// Default caller-side timeout for one lookup.
pub const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_secs(10);

/// Default caller-side timeout for one media fetch plus upload.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Bundle of collaborators handed to an [`crate::Encoder`] or
/// [`crate::Decoder`].
#[derive(Clone)]
pub struct Resolvers {
    pub media: Arc<dyn MediaResolver>,
    pub mentions: Arc<dyn MentionResolver>,
    pub quotes: Arc<dyn QuoteResolver>,
    pub sender: Arc<dyn MessageSender>,
    /// Applied to every mention and quote lookup. Sends are not bounded
    /// here; the transport has its own timeout.
    pub timeout: Duration,
    /// Applied to every media upload, fetch included.
    pub upload_timeout: Duration,
}

impl Resolvers {
    pub fn new(
        media: Arc<dyn MediaResolver>,
        mentions: Arc<dyn MentionResolver>,
        quotes: Arc<dyn QuoteResolver>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            media,
            mentions,
            quotes,
            sender,
            timeout: DEFAULT_RESOLVER_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Run one lookup under the resolver timeout.
    pub async fn bounded<T>(
        &self,
        operation: &'static str,
        lookup: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        within(self.timeout, operation, lookup).await
    }

    /// Run one media upload under the upload timeout.
    pub async fn bounded_upload<T>(
        &self,
        operation: &'static str,
        upload: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        within(self.upload_timeout, operation, upload).await
    }
}

async fn within<T>(
    limit: Duration,
    operation: &'static str,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, future)
        .await
        .unwrap_or(Err(Error::Timeout { operation }))
}

impl std::fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolvers")
            .field("timeout", &self.timeout)
            .field("upload_timeout", &self.upload_timeout)
            .finish_non_exhaustive()
    }
}


#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::{testing::FakeBackend, *};

    #[tokio::test]
    async fn bounded_reports_timeout() {
        let backend = Arc::new(FakeBackend {
            hang_users: true,
            ..Default::default()
        });
        let resolvers = backend.resolvers().with_timeout(Duration::from_millis(20));
        let result = resolvers
            .bounded("user lookup", resolvers.mentions.get_user("u1"))
            .await;
        assert!(matches!(
            result,
            Err(Error::Timeout {
                operation: "user lookup"
            })
        ));
    }

    #[tokio::test]
    async fn uploads_use_their_own_bound() {
        let backend = Arc::new(FakeBackend {
            upload_delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let resolvers = backend
            .resolvers()
            .with_timeout(Duration::from_millis(10))
            .with_upload_timeout(Duration::from_secs(5));
        let key = resolvers
            .bounded_upload("file upload", resolvers.media.upload_file("https://x/a.zip"))
            .await
            .unwrap();
        assert_eq!(key, "file-key-1");

        let short = resolvers.with_upload_timeout(Duration::from_millis(10));
        let result = short
            .bounded_upload("file upload", short.media.upload_file("https://x/b.zip"))
            .await;
        assert!(matches!(
            result,
            Err(Error::Timeout {
                operation: "file upload"
            })
        ));
    }

    #[tokio::test]
    async fn bounded_passes_result_through() {
        let backend = Arc::new(FakeBackend::default().with_user("u1", "neko"));
        let resolvers = backend.resolvers();
        let profile = resolvers
            .bounded("user lookup", resolvers.mentions.get_user("u1"))
            .await
            .unwrap();
        assert_eq!(profile.name, "neko");
    }
}
