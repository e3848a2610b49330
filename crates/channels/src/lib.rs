//! Channel plugin system.
//!
//! Each chat platform implements the ChannelPlugin trait with sub-traits for
//! outbound messaging and status; inbound traffic is reported to the host
//! through a ChannelEventSink.

pub mod error;
pub mod plugin;
pub mod registry;

pub use {
    error::{Error, Result},
    plugin::{
        ChannelEventSink, ChannelHealthSnapshot, ChannelOutbound, ChannelPlugin, ChannelStatus,
    },
    registry::ChannelRegistry,
};
