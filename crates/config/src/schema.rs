/// Config schema types.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub channels: ChannelsConfig,
}

/// Channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Yunhu bot accounts, keyed by account ID. Each value is handed to the
    /// channel plugin verbatim, which owns the account schema.
    #[serde(default)]
    pub yunhu: HashMap<String, serde_json::Value>,
}

impl BridgeConfig {
    /// Account IDs configured for the yunhu channel, sorted for stable startup order.
    #[must_use]
    pub fn yunhu_account_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.channels.yunhu.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
