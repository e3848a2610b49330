use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::lattice::MediaKind;

const MIB: usize = 1024 * 1024;

/// Configuration for a single Yunhu bot account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YunhuAccountConfig {
    /// Bot token from the Yunhu developer console.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Bot user id, reported as `self_id` on sessions.
    pub bot_id: String,

    /// Open API base URL.
    pub endpoint: String,

    /// Web API base URL, used for user profile lookups.
    pub web_endpoint: String,

    /// Public image host; uploaded images are served from here.
    pub resource_endpoint: String,

    /// Address the webhook server binds to.
    pub listen: String,

    /// HTTP path the webhook is served on.
    pub webhook_path: String,

    /// Timeout for fetching and uploading one media resource.
    pub upload_timeout_secs: u64,

    /// Timeout applied to each user / message lookup made while encoding or
    /// decoding.
    pub resolver_timeout_secs: u64,

    pub max_image_bytes: usize,
    pub max_video_bytes: usize,
    pub max_file_bytes: usize,

    /// Log raw webhook and send payloads at info instead of debug.
    pub log_payloads: bool,
}

impl YunhuAccountConfig {
    /// Upload size limit for a media kind.
    #[must_use]
    pub fn size_limit(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Image => self.max_image_bytes,
            MediaKind::Video => self.max_video_bytes,
            MediaKind::File => self.max_file_bytes,
        }
    }

    /// Caller-side bound for one media upload: the fetch and the upload
    /// request each get `upload_timeout_secs`.
    #[must_use]
    pub fn media_budget(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs.max(1).saturating_mul(2))
    }
}

impl std::fmt::Debug for YunhuAccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YunhuAccountConfig")
            .field("token", &"[REDACTED]")
            .field("bot_id", &self.bot_id)
            .field("endpoint", &self.endpoint)
            .field("listen", &self.listen)
            .field("webhook_path", &self.webhook_path)
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for YunhuAccountConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            bot_id: String::new(),
            endpoint: "https://chat-go.jwzhd.com/open-apis/v1".into(),
            web_endpoint: "https://chat-web-go.jwzhd.com/v1".into(),
            resource_endpoint: "https://chat-img.jwznb.com/".into(),
            listen: "127.0.0.1:5140".into(),
            webhook_path: "/yunhu".into(),
            upload_timeout_secs: 30,
            resolver_timeout_secs: 10,
            max_image_bytes: 10 * MIB,
            max_video_bytes: 20 * MIB,
            max_file_bytes: 100 * MIB,
            log_payloads: false,
        }
    }
}
