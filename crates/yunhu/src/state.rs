use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, RwLock},
    time::Duration,
};

use tokio_util::sync::CancellationToken;

use yunhu_channels::ChannelEventSink;

use crate::{
    api::YunhuApi,
    config::YunhuAccountConfig,
    decoder::Decoder,
    encoder::Encoder,
    error::Result,
    resolver::Resolvers,
    upload::HttpUploader,
    wire::ChannelTarget,
};

/// Shared account state map.
pub type AccountStateMap = Arc<RwLock<HashMap<String, AccountState>>>;

/// Per-account runtime state.
pub struct AccountState {
    pub account_id: String,
    pub config: YunhuAccountConfig,
    pub api: YunhuApi,
    pub resolvers: Resolvers,
    pub decoder: Decoder,
    pub cancel: CancellationToken,
    pub event_sink: Option<Arc<dyn ChannelEventSink>>,
    /// Address the webhook server actually bound to.
    pub local_addr: Option<SocketAddr>,
}

impl AccountState {
    /// Wire the API client, uploader and codec for one account.
    pub fn new(
        account_id: impl Into<String>,
        config: YunhuAccountConfig,
        event_sink: Option<Arc<dyn ChannelEventSink>>,
    ) -> Result<Self> {
        let api = YunhuApi::new(&config)?;
        let shared = Arc::new(api.clone());
        let resolvers = Resolvers::new(
            Arc::new(HttpUploader::new(api.clone(), &config)),
            Arc::clone(&shared) as _,
            Arc::clone(&shared) as _,
            shared,
        )
        .with_timeout(Duration::from_secs(config.resolver_timeout_secs.max(1)))
        .with_upload_timeout(config.media_budget());
        let decoder = Decoder::new(resolvers.clone(), config.resource_endpoint.clone());
        Ok(Self {
            account_id: account_id.into(),
            config,
            api,
            resolvers,
            decoder,
            cancel: CancellationToken::new(),
            event_sink,
            local_addr: None,
        })
    }

    /// A fresh encoder addressed at `target`.
    #[must_use]
    pub fn encoder(&self, target: ChannelTarget) -> Encoder {
        let encoder = Encoder::new(self.resolvers.clone(), target)
            .with_payload_logging(self.config.log_payloads);
        match &self.event_sink {
            Some(sink) => encoder.with_event_sink(Arc::clone(sink), self.config.bot_id.clone()),
            None => encoder,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploads_get_a_longer_bound_than_lookups() {
        let config = YunhuAccountConfig {
            resolver_timeout_secs: 10,
            upload_timeout_secs: 30,
            ..Default::default()
        };
        let state = AccountState::new("main", config, None).unwrap();
        assert_eq!(state.resolvers.timeout, Duration::from_secs(10));
        assert_eq!(state.resolvers.upload_timeout, Duration::from_secs(60));
    }
}
