//! CLI subcommands for the configured Yunhu accounts.

use {
    anyhow::{Result, anyhow},
    clap::Subcommand,
    secrecy::ExposeSecret,
    serde_json::Value,
};

use {
    yunhu::{YunhuAccountConfig, YunhuPlugin},
    yunhu_channels::ChannelPlugin,
    yunhu_config::BridgeConfig,
};

#[derive(Subcommand)]
pub enum ChannelAction {
    /// List configured accounts and their webhook endpoints.
    Status,
    /// Send a plain-text message from an account and print the message ids.
    Send {
        /// Account ID from the config file.
        #[arg(long)]
        account: String,
        /// Target channel: `private:<user id>` or `group:<group id>`.
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        message: String,
    },
}

pub async fn handle_channels(action: ChannelAction, config: &BridgeConfig) -> Result<()> {
    match action {
        ChannelAction::Status => {
            let lines = describe_accounts(config);
            if lines.is_empty() {
                println!("No yunhu accounts configured.");
            }
            for line in lines {
                println!("{line}");
            }
            Ok(())
        },
        ChannelAction::Send {
            account,
            to,
            message,
        } => {
            let ids = send_once(config, &account, &to, &message).await?;
            for id in ids {
                println!("{id}");
            }
            Ok(())
        },
    }
}

/// One line per configured account, in startup order.
fn describe_accounts(config: &BridgeConfig) -> Vec<String> {
    config
        .yunhu_account_ids()
        .into_iter()
        .map(|id| {
            let raw = config.channels.yunhu.get(id).cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<YunhuAccountConfig>(raw) {
                Ok(account) => format!(
                    "  {id}: webhook http://{}{} (token {})",
                    account.listen,
                    account.webhook_path,
                    if account.token.expose_secret().is_empty() {
                        "missing"
                    } else {
                        "set"
                    },
                ),
                Err(e) => format!("  {id}: invalid config: {e}"),
            }
        })
        .collect()
}

/// Start `account` on an ephemeral port, send one message and stop it.
async fn send_once(
    config: &BridgeConfig,
    account: &str,
    to: &str,
    message: &str,
) -> Result<Vec<String>> {
    let mut raw = config
        .channels
        .yunhu
        .get(account)
        .cloned()
        .ok_or_else(|| anyhow!("account not found in config: {account}"))?;
    if let Value::Object(map) = &mut raw {
        map.insert("listen".into(), Value::String("127.0.0.1:0".into()));
    }

    let mut plugin = YunhuPlugin::new();
    plugin.start_account(account, raw).await?;
    let result = match plugin.outbound() {
        Some(outbound) => outbound.send_text(account, to, message).await,
        None => Err(anyhow!("yunhu plugin has no outbound")),
    };
    plugin.stop_account(account).await?;
    result
}
