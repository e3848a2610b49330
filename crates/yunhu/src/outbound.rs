use {
    anyhow::Result,
    async_trait::async_trait,
    tracing::{debug, info},
};

use {
    yunhu_channels::{ChannelOutbound, Error as ChannelError},
    yunhu_common::Element,
};

use crate::{api::YunhuApi, encoder::Encoder, state::AccountStateMap, wire::ChannelTarget};

/// Outbound message sender for Yunhu.
pub struct YunhuOutbound {
    pub(crate) accounts: AccountStateMap,
}

impl YunhuOutbound {
    fn encoder(&self, account_id: &str, target: ChannelTarget) -> Result<Encoder> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        accounts
            .get(account_id)
            .map(|s| s.encoder(target))
            .ok_or_else(|| ChannelError::unknown_account(account_id).into())
    }

    fn api(&self, account_id: &str) -> Result<YunhuApi> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        accounts
            .get(account_id)
            .map(|s| s.api.clone())
            .ok_or_else(|| ChannelError::unknown_account(account_id).into())
    }
}

#[async_trait]
impl ChannelOutbound for YunhuOutbound {
    async fn send(
        &self,
        account_id: &str,
        channel_id: &str,
        elements: &[Element],
        reply_to: Option<&str>,
    ) -> Result<Vec<String>> {
        let target = ChannelTarget::parse(channel_id)?;
        let encoder = self
            .encoder(account_id, target)?
            .with_reply_to(reply_to.map(str::to_string));
        debug!(account_id, channel_id, elements = elements.len(), "encoding yunhu message");
        let ids = encoder.send(elements).await?;
        info!(account_id, channel_id, sent = ids.len(), "yunhu message sent");
        Ok(ids)
    }

    async fn recall(&self, account_id: &str, channel_id: &str, message_id: &str) -> Result<()> {
        let api = self.api(account_id)?;
        api.recall(channel_id, message_id).await?;
        info!(account_id, channel_id, message_id, "yunhu message recalled");
        Ok(())
    }
}
