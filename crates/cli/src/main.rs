mod channel_commands;
mod sink;

use std::{path::PathBuf, sync::Arc};

use {
    clap::{Parser, Subcommand},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    yunhu::YunhuPlugin,
    yunhu_channels::ChannelRegistry,
    yunhu_config::BridgeConfig,
};

#[derive(Parser)]
#[command(name = "yunhu-bridge", about = "Yunhu bot channel bridge")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/yunhu-bridge/).
    #[arg(long, global = true, env = "YUNHU_BRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve every configured account (default when no subcommand is provided).
    Serve,
    /// Account management.
    Channels {
        #[command(subcommand)]
        action: channel_commands::ChannelAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    match &cli.config {
        Some(path) => yunhu_config::load_config(path),
        None => Ok(yunhu_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "yunhu-bridge starting");

    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::Channels { action }) => {
            channel_commands::handle_channels(action, &config).await
        },
    }
}

/// Start every configured account and run until Ctrl-C.
async fn serve(config: BridgeConfig) -> anyhow::Result<()> {
    let mut registry = ChannelRegistry::new();
    registry.register(Box::new(
        YunhuPlugin::new().with_event_sink(Arc::new(sink::LogSink)),
    ));
    let plugin = registry
        .get_mut(yunhu::PLATFORM)
        .ok_or_else(|| anyhow::anyhow!("yunhu plugin not registered"))?;

    let mut started = Vec::new();
    for account_id in config.yunhu_account_ids() {
        let account = config.channels.yunhu[account_id].clone();
        match plugin.start_account(account_id, account).await {
            Ok(()) => started.push(account_id.to_string()),
            Err(e) => error!(account_id, error = %e, "failed to start yunhu account"),
        }
    }

    if started.is_empty() {
        warn!("no yunhu accounts running; add one under [channels.yunhu.<id>]");
        return Ok(());
    }
    info!(accounts = started.len(), "yunhu-bridge ready");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    for account_id in &started {
        if let Err(e) = plugin.stop_account(account_id).await {
            warn!(account_id, error = %e, "failed to stop yunhu account");
        }
    }
    Ok(())
}
