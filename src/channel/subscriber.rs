//! Subscription types
//!
//! One subscriber is one HTTP client attached to a channel, tagged with
//! its delivery transport. The broadcast loop dispatches on the tag.

use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

/// Callback name used when a long-poll request carries no `jsonp` query
/// parameter
pub const DEFAULT_JSONP_CALLBACK: &str = "jsonpcallback";

/// Delivery transport for a channel's subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// One chunked HTTP response held open; each message is a framed,
    /// padded chunk
    #[default]
    Streaming,
    /// One held request completed by exactly one message (JSONP)
    LongPoll,
}

impl DeliveryMode {
    /// Parse a config value. Accepts `streaming`, `longpoll`,
    /// `long_poll` and `jsonp`, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "streaming" => Some(DeliveryMode::Streaming),
            "longpoll" | "long_poll" | "jsonp" => Some(DeliveryMode::LongPoll),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Streaming => f.write_str("streaming"),
            DeliveryMode::LongPoll => f.write_str("longpoll"),
        }
    }
}

/// Per-mode connection state held in the subscriber set
pub(crate) enum Transport {
    /// Sender feeding the open chunked response, plus the shared count of
    /// bytes enqueued but not yet pulled by the connection
    Streaming {
        tx: mpsc::UnboundedSender<Bytes>,
        queued: Arc<AtomicUsize>,
    },
    /// Parked request: the reply sender completes the held response.
    /// `reply` is taken exactly once, by the broadcast engine.
    LongPoll {
        callback: String,
        reply: Option<oneshot::Sender<Bytes>>,
    },
}

/// One client attached to a channel
pub(crate) struct Subscriber {
    pub id: u64,
    pub peer: SocketAddr,
    pub transport: Transport,
}

impl Subscriber {
    pub fn mode(&self) -> DeliveryMode {
        match self.transport {
            Transport::Streaming { .. } => DeliveryMode::Streaming,
            Transport::LongPoll { .. } => DeliveryMode::LongPoll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!(DeliveryMode::parse("streaming"), Some(DeliveryMode::Streaming));
        assert_eq!(DeliveryMode::parse("LongPoll"), Some(DeliveryMode::LongPoll));
        assert_eq!(DeliveryMode::parse("long_poll"), Some(DeliveryMode::LongPoll));
        assert_eq!(DeliveryMode::parse("jsonp"), Some(DeliveryMode::LongPoll));
        assert_eq!(DeliveryMode::parse("push"), None);
    }

    #[test]
    fn test_mode_default() {
        assert_eq!(DeliveryMode::default(), DeliveryMode::Streaming);
    }
}
