//! Comet pub/sub server
//!
//! HTTP clients subscribe to named channels with a GET that the server
//! holds open, and publish byte payloads with a POST; every currently
//! subscribed client receives the payload. Two delivery transports are
//! built on the same channel abstraction:
//!
//! - **Streaming**: one chunked HTTP response stays open per subscriber;
//!   each published message becomes one chunk, padded with spaces to a
//!   4096-byte boundary for browsers that buffer short partial responses.
//!   A subscriber whose outbound queue exceeds 1 MB loses the newest
//!   message instead of blocking the publisher.
//! - **Long-poll (JSONP)**: one held GET is completed by exactly one
//!   message, wrapped as `callback(payload);`; the client re-subscribes
//!   to keep listening.
//!
//! Publishing can be gated per channel with a shared secret carried in
//! the `X-CPS-Publish-Key` header.
//!
//! # Example
//!
//! ```no_run
//! use cometps::{ChannelOptions, CometServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> cometps::Result<()> {
//!     let server = CometServer::start(ServerConfig::default()).await?;
//!     server.open_channel(ChannelOptions::new("default"));
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod log;
pub mod server;

pub use channel::{
    Channel, ChannelError, ChannelOptions, ChannelRegistry, ChannelStats, DeliveryMode,
    PublishAuthError,
};
pub use config::Config;
pub use error::{Error, Result};
pub use log::LogLevel;
pub use server::{CometServer, ServerConfig};
