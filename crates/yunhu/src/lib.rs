//! Yunhu channel plugin.
//!
//! Translates the host element tree to Yunhu wire messages and back, and
//! implements `ChannelPlugin` on top of the Yunhu open API: outbound sends go
//! through [`encoder::Encoder`], inbound webhook events are decoded by
//! [`decoder::Decoder`] and adapted to host sessions.

pub mod api;
pub mod bot;
pub mod buffer;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod handlers;
pub mod lattice;
pub mod markup;
pub mod outbound;
pub mod plugin;
pub mod resolver;
pub mod state;
pub mod upload;
pub mod webhook;
pub mod wire;

pub use {
    config::YunhuAccountConfig,
    decoder::Decoder,
    encoder::Encoder,
    error::{Error, Result},
    plugin::YunhuPlugin,
    resolver::Resolvers,
};

/// Platform name reported on every session.
pub const PLATFORM: &str = "yunhu";
