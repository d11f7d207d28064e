//! Channels, subscriptions and the broadcast engine
//!
//! A server mounts named channels; clients subscribe with a GET that is
//! held open and publish with a POST. The broadcast engine fans each
//! published payload out to every live subscriber.
//!
//! # Architecture
//!
//! ```text
//!                       CometServer
//!                 ┌──────────────────────────┐
//!                 │ ChannelRegistry          │
//!                 │   uri -> Channel {       │
//!                 │     subscribers: Vec,    │
//!                 │     publish_key, mode,   │
//!                 │   }                      │
//!                 └────────────┬─────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!     [Publisher]         [Subscriber]        [Subscriber]
//!     POST /channel/x     GET (streaming)     GET (long-poll)
//!          │                   ▲                   ▲
//!          │              padded chunk        jsonp reply
//!          │                   │                   │
//!          └──► Channel::publish() ───┴───────────┘
//! ```
//!
//! Payloads are `bytes::Bytes`, so fan-out to many subscribers shares
//! one reference-counted allocation; per-subscriber framing (padding,
//! JSONP wrapping) is the only copy made.

pub mod entry;
pub mod error;
pub mod registry;
pub mod stats;
pub mod subscriber;

pub use entry::{Channel, ChannelOptions, LongPollSubscription, StreamingSubscription, MAX_CLIENT_BUFSIZ};
pub use error::{ChannelError, PublishAuthError};
pub use registry::ChannelRegistry;
pub use stats::ChannelStats;
pub use subscriber::{DeliveryMode, DEFAULT_JSONP_CALLBACK};
