use thiserror::Error;

use crate::lattice::MediaKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Channel(#[from] yunhu_channels::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The open API answered with a non-success code.
    #[error("yunhu api error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("{kind} of {size} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded {
        kind: MediaKind,
        size: usize,
        limit: usize,
    },

    /// A lookup collaborator failed.
    #[error("resolver failed: {message}")]
    Resolver { message: String },

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    /// Sending a flush unit failed. Surfaced to the caller of the encode.
    #[error("send failed: {source}")]
    Transport {
        #[source]
        source: Box<Error>,
    },

    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    #[error("unsupported: {message}")]
    Unsupported { message: String },

    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn resolver(message: impl std::fmt::Display) -> Self {
        Self::Resolver {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(source: Error) -> Self {
        Self::Transport {
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
