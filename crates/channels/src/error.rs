/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by every channel plugin.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown channel account: {account_id}")]
    UnknownAccount { account_id: String },

    /// The channel id does not address a chat on the platform.
    #[error("invalid channel id: {channel_id}")]
    InvalidChannelId { channel_id: String },

    #[error("{operation} is not supported by this channel")]
    Unsupported { operation: &'static str },
}

impl Error {
    #[must_use]
    pub fn unknown_account(account_id: impl std::fmt::Display) -> Self {
        Self::UnknownAccount {
            account_id: account_id.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_channel_id(channel_id: impl std::fmt::Display) -> Self {
        Self::InvalidChannelId {
            channel_id: channel_id.to_string(),
        }
    }

    #[must_use]
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        assert_eq!(
            Error::unknown_account("main").to_string(),
            "unknown channel account: main"
        );
        assert_eq!(
            Error::invalid_channel_id("g1").to_string(),
            "invalid channel id: g1"
        );
        assert_eq!(
            Error::unsupported("recall").to_string(),
            "recall is not supported by this channel"
        );
    }
}
