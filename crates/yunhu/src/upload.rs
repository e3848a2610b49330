//! Media resolver backed by the Yunhu upload APIs.

use std::time::Duration;

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD as BASE64},
    futures::StreamExt,
    md5::{Digest, Md5},
    tracing::{debug, warn},
};

use crate::{
    api::YunhuApi,
    config::YunhuAccountConfig,
    error::{Error, Result},
    lattice::MediaKind,
    resolver::{MediaResolver, UploadedImage},
};

/// A resource loaded into memory, ready for upload.
#[derive(Debug)]
struct Fetched {
    bytes: Vec<u8>,
    mime: String,
    filename: String,
}

/// Fetches media from URLs, data URIs or local paths and uploads it.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    api: YunhuApi,
    resource_endpoint: String,
    fetch_timeout: Duration,
    max_image_bytes: usize,
    max_video_bytes: usize,
    max_file_bytes: usize,
}

impl HttpUploader {
    #[must_use]
    pub fn new(api: YunhuApi, config: &YunhuAccountConfig) -> Self {
        Self {
            api,
            resource_endpoint: config.resource_endpoint.clone(),
            fetch_timeout: Duration::from_secs(config.upload_timeout_secs.max(1)),
            max_image_bytes: config.size_limit(MediaKind::Image),
            max_video_bytes: config.size_limit(MediaKind::Video),
            max_file_bytes: config.size_limit(MediaKind::File),
        }
    }

    fn limit(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Image => self.max_image_bytes,
            MediaKind::Video => self.max_video_bytes,
            MediaKind::File => self.max_file_bytes,
        }
    }

    async fn fetch(&self, src: &str, kind: MediaKind) -> Result<Fetched> {
        if let Some(rest) = src.strip_prefix("data:") {
            return decode_data_uri(rest, kind);
        }
        if src.starts_with("http://") || src.starts_with("https://") {
            return self.download(src, kind).await;
        }
        let path = src.strip_prefix("file://").unwrap_or(src);
        let size = tokio::fs::metadata(path).await?.len();
        self.check_size(kind, usize::try_from(size).unwrap_or(usize::MAX))?;
        let bytes = tokio::fs::read(path).await?;
        let filename = std::path::Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .map_or_else(|| kind.to_string(), str::to_string);
        Ok(Fetched {
            bytes,
            mime: mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string(),
            filename,
        })
    }

    fn check_size(&self, kind: MediaKind, size: usize) -> Result<()> {
        let limit = self.limit(kind);
        if size > limit {
            warn!(kind = %kind, size, limit, "media exceeds size limit");
            return Err(Error::SizeLimitExceeded { kind, size, limit });
        }
        Ok(())
    }

    /// Stream a remote body, giving up as soon as it passes the size limit.
    async fn download(&self, url: &str, kind: MediaKind) -> Result<Fetched> {
        let response = self
            .api
            .client()
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::message(format!("fetching {url} failed: HTTP {status}")));
        }
        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());
        let filename = response
            .url()
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .map_or_else(|| kind.to_string(), str::to_string);
        let mime = header_mime.unwrap_or_else(|| {
            mime_guess::from_path(&filename)
                .first_or_octet_stream()
                .to_string()
        });
        if let Some(length) = response.content_length() {
            self.check_size(kind, usize::try_from(length).unwrap_or(usize::MAX))?;
        }

        let mut bytes = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            bytes.extend_from_slice(&chunk?);
            self.check_size(kind, bytes.len())?;
        }
        Ok(Fetched {
            bytes,
            mime,
            filename,
        })
    }

    async fn load(&self, src: &str, kind: MediaKind) -> Result<Fetched> {
        let fetched = self.fetch(src, kind).await?;
        if fetched.bytes.is_empty() {
            return Err(Error::malformed(format!("{kind} resource is empty")));
        }
        self.check_size(kind, fetched.bytes.len())?;
        debug!(kind = %kind, mime = %fetched.mime, size = fetched.bytes.len(), "media loaded");
        Ok(fetched)
    }

    async fn upload(&self, kind: MediaKind, fetched: Fetched) -> Result<String> {
        self.api
            .upload(kind, fetched.bytes, &fetched.filename, &fetched.mime)
            .await
    }
}

/// Parse the part of a data URI after `data:`. Only base64 payloads are
/// accepted.
fn decode_data_uri(rest: &str, kind: MediaKind) -> Result<Fetched> {
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| Error::malformed("data URI without payload"))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| Error::malformed("data URI is not base64 encoded"))?;
    let mime = if mime.is_empty() {
        "application/octet-stream".to_string()
    } else {
        mime.to_ascii_lowercase()
    };
    let bytes = BASE64
        .decode(data.trim())
        .map_err(|e| Error::external("invalid base64 in data URI", e))?;
    Ok(Fetched {
        filename: format!("{kind}.{}", subtype(&mime)),
        bytes,
        mime,
    })
}

fn subtype(mime: &str) -> &str {
    mime.split_once('/')
        .map(|(_, sub)| sub)
        .filter(|sub| !sub.is_empty())
        .unwrap_or("bin")
}

#[async_trait]
impl MediaResolver for HttpUploader {
    async fn upload_image(&self, src: &str) -> Result<UploadedImage> {
        let fetched = self.load(src, MediaKind::Image).await?;
        if !fetched.mime.starts_with("image/") {
            return Err(Error::unsupported(format!("image type {}", fetched.mime)));
        }
        let hash = format!("{:x}", Md5::digest(&fetched.bytes));
        let url = format!("{}{hash}.{}", self.resource_endpoint, subtype(&fetched.mime));
        let key = self.upload(MediaKind::Image, fetched).await?;
        Ok(UploadedImage { key, url })
    }

    async fn upload_video(&self, src: &str) -> Result<String> {
        let fetched = self.load(src, MediaKind::Video).await?;
        self.upload(MediaKind::Video, fetched).await
    }

    async fn upload_file(&self, src: &str) -> Result<String> {
        let fetched = self.load(src, MediaKind::File).await?;
        self.upload(MediaKind::File, fetched).await
    }

    async fn upload_audio(&self, _src: &str) -> Result<String> {
        Err(Error::unsupported("audio transcoding"))
    }
}
