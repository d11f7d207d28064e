//! HTTP server: bind, accept and dispatch

pub mod config;
pub mod listener;

pub use config::{ServerConfig, DEFAULT_CHANNELS_PREFIX};
pub use listener::CometServer;
