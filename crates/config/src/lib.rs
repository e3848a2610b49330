//! Configuration loading and env substitution.
//!
//! Config files: `yunhu-bridge.toml`, `yunhu-bridge.yaml`, or `yunhu-bridge.json`
//! Searched in `./` then `~/.config/yunhu-bridge/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, discover_and_load, load_config},
    schema::{BridgeConfig, ChannelsConfig},
};
