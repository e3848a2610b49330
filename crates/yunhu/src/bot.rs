use std::sync::Arc;

use {
    tokio_util::sync::CancellationToken,
    tracing::{error, info},
};

use yunhu_channels::ChannelEventSink;

use crate::{
    PLATFORM,
    config::YunhuAccountConfig,
    state::{AccountState, AccountStateMap},
    webhook::{self, WebhookState},
};

/// Start the webhook server for a single bot account.
///
/// Binds `config.listen`, registers the account and serves events until the
/// returned `CancellationToken` is cancelled.
pub async fn start_webhook(
    account_id: String,
    config: YunhuAccountConfig,
    accounts: AccountStateMap,
    event_sink: Option<Arc<dyn ChannelEventSink>>,
) -> anyhow::Result<CancellationToken> {
    if !config.webhook_path.starts_with('/') {
        anyhow::bail!(
            "webhook_path must start with '/': {}",
            config.webhook_path
        );
    }

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", config.listen))?;
    let local_addr = listener.local_addr()?;
    let path = config.webhook_path.clone();

    let mut state = AccountState::new(account_id.clone(), config, event_sink.clone())?;
    state.local_addr = Some(local_addr);
    let cancel = state.cancel.clone();
    {
        let mut map = accounts.write().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = map.insert(account_id.clone(), state) {
            previous.cancel.cancel();
        }
    }

    let app = webhook::router(&path, WebhookState {
        account_id: account_id.clone(),
        accounts,
    });

    info!(account_id, %local_addr, path, "yunhu webhook listening");

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;
        match served {
            Ok(()) => info!(account_id, "yunhu webhook stopped"),
            Err(e) => {
                error!(account_id, error = %e, "yunhu webhook server failed");
                if let Some(sink) = event_sink {
                    sink.request_disable_account(PLATFORM, &account_id, &e.to_string())
                        .await;
                }
            },
        }
    });

    Ok(cancel)
}
