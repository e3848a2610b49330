use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, RwLock},
    time::Instant,
};

use {
    anyhow::Result,
    async_trait::async_trait,
    secrecy::ExposeSecret,
    tracing::{info, warn},
};

use yunhu_channels::{
    ChannelEventSink,
    plugin::{ChannelHealthSnapshot, ChannelOutbound, ChannelPlugin, ChannelStatus},
};

use crate::{
    PLATFORM, bot, config::YunhuAccountConfig, outbound::YunhuOutbound, state::AccountStateMap,
};

/// Cache TTL for probe results (30 seconds).
const PROBE_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(30);

/// Yunhu channel plugin.
pub struct YunhuPlugin {
    accounts: AccountStateMap,
    outbound: YunhuOutbound,
    event_sink: Option<Arc<dyn ChannelEventSink>>,
    probe_cache: RwLock<HashMap<String, (ChannelHealthSnapshot, Instant)>>,
}

impl YunhuPlugin {
    pub fn new() -> Self {
        let accounts: AccountStateMap = Arc::new(RwLock::new(HashMap::new()));
        let outbound = YunhuOutbound {
            accounts: Arc::clone(&accounts),
        };
        Self {
            accounts,
            outbound,
            event_sink: None,
            probe_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn ChannelEventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Get a shared reference to the outbound sender (for use outside the plugin).
    pub fn shared_outbound(&self) -> Arc<dyn ChannelOutbound> {
        Arc::new(YunhuOutbound {
            accounts: Arc::clone(&self.accounts),
        })
    }

    /// List all active account IDs.
    pub fn account_ids(&self) -> Vec<String> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = accounts.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Get the config for a specific account (serialized to JSON).
    pub fn account_config(&self, account_id: &str) -> Option<serde_json::Value> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        accounts
            .get(account_id)
            .and_then(|s| serde_json::to_value(&s.config).ok())
    }

    /// Address the account's webhook server is bound to.
    pub fn local_addr(&self, account_id: &str) -> Option<SocketAddr> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        accounts.get(account_id).and_then(|s| s.local_addr)
    }
}

impl Default for YunhuPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelPlugin for YunhuPlugin {
    fn id(&self) -> &str {
        PLATFORM
    }

    fn name(&self) -> &str {
        "Yunhu"
    }

    async fn start_account(&mut self, account_id: &str, config: serde_json::Value) -> Result<()> {
        let yh_config: YunhuAccountConfig = serde_json::from_value(config)?;

        if yh_config.token.expose_secret().is_empty() {
            return Err(anyhow::anyhow!("yunhu bot token is required"));
        }

        info!(account_id, "starting yunhu account");

        bot::start_webhook(
            account_id.to_string(),
            yh_config,
            Arc::clone(&self.accounts),
            self.event_sink.clone(),
        )
        .await?;

        Ok(())
    }

    async fn stop_account(&mut self, account_id: &str) -> Result<()> {
        let removed = {
            let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
            accounts.remove(account_id)
        };

        if let Some(state) = removed {
            info!(account_id, "stopping yunhu account");
            state.cancel.cancel();
            if let Ok(mut cache) = self.probe_cache.write() {
                cache.remove(account_id);
            }
        } else {
            warn!(account_id, "yunhu account not found");
        }

        Ok(())
    }

    fn outbound(&self) -> Option<&dyn ChannelOutbound> {
        Some(&self.outbound)
    }

    fn status(&self) -> Option<&dyn ChannelStatus> {
        Some(self)
    }
}

#[async_trait]
impl ChannelStatus for YunhuPlugin {
    async fn probe(&self, account_id: &str) -> Result<ChannelHealthSnapshot> {
        if let Ok(cache) = self.probe_cache.read()
            && let Some((snap, ts)) = cache.get(account_id)
            && ts.elapsed() < PROBE_CACHE_TTL
        {
            return Ok(snap.clone());
        }

        let endpoint = {
            let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
            accounts.get(account_id).map(|s| {
                (
                    s.cancel.is_cancelled(),
                    s.local_addr,
                    s.config.webhook_path.clone(),
                    s.api.clone(),
                    s.config.bot_id.clone(),
                )
            })
        };

        let result = match endpoint {
            Some((false, Some(addr), path, _, bot_id)) if bot_id.is_empty() => {
                ChannelHealthSnapshot {
                    connected: true,
                    account_id: account_id.to_string(),
                    details: Some(format!("webhook on http://{addr}{path}, bot_id not set")),
                }
            },
            Some((false, Some(addr), path, api, bot_id)) => match api.bot_info(&bot_id).await {
                Ok(bot) => ChannelHealthSnapshot {
                    connected: true,
                    account_id: account_id.to_string(),
                    details: Some(format!(
                        "bot {} ({bot_id}), webhook on http://{addr}{path}",
                        bot.nickname
                    )),
                },
                Err(e) => ChannelHealthSnapshot {
                    connected: false,
                    account_id: account_id.to_string(),
                    details: Some(format!("bot-info failed: {e}")),
                },
            },
            Some(_) => ChannelHealthSnapshot {
                connected: false,
                account_id: account_id.to_string(),
                details: Some("webhook not listening".into()),
            },
            None => ChannelHealthSnapshot {
                connected: false,
                account_id: account_id.to_string(),
                details: Some("account not started".into()),
            },
        };

        if let Ok(mut cache) = self.probe_cache.write() {
            cache.insert(account_id.to_string(), (result.clone(), Instant::now()));
        }

        Ok(result)
    }
}
