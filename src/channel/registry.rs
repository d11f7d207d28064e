//! Channel registry
//!
//! The set of channels mounted on one server, keyed by mount URI.
//! Channel names are unique per server; opening a duplicate logs a
//! warning and yields no handle.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::log::LogLevel;

use super::entry::{Channel, ChannelOptions};

/// Channels owned by one server
pub struct ChannelRegistry {
    server_name: String,
    channels_prefix: String,
    log_level: LogLevel,
    /// Mount URI -> channel
    channels: RwLock<HashMap<String, Arc<Channel>>>,
}

impl ChannelRegistry {
    pub(crate) fn new(server_name: String, channels_prefix: String, log_level: LogLevel) -> Self {
        Self {
            server_name,
            channels_prefix,
            log_level,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Prefix the mount URI is derived from (`{prefix}{name}`)
    pub fn channels_prefix(&self) -> &str {
        &self.channels_prefix
    }

    /// Open a channel. A duplicate name is a no-op that logs a warning
    /// and returns `None`; the existing channel is untouched.
    pub fn open(&self, opts: ChannelOptions) -> Option<Arc<Channel>> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if channels.values().any(|ch| ch.name() == opts.name) {
            if self.log_level.allows(LogLevel::Warn) {
                tracing::warn!(
                    server = %self.server_name,
                    channel = %opts.name,
                    "duplicate channel -- skipping channel"
                );
            }
            return None;
        }

        let uri = format!("{}{}", self.channels_prefix, opts.name);
        let log_level = opts.log_level;
        let publish_key = opts.publish_key.clone().filter(|k| !k.is_empty());
        let channel = Arc::new(Channel::new(self.server_name.clone(), uri.clone(), opts));
        channels.insert(uri.clone(), Arc::clone(&channel));
        drop(channels);

        if log_level.allows(LogLevel::Info) {
            match publish_key {
                Some(key) => tracing::info!(
                    server = %self.server_name,
                    channel = %channel.name(),
                    "channel opened at {}, publish_key: {}",
                    uri,
                    key
                ),
                None => tracing::info!(
                    server = %self.server_name,
                    channel = %channel.name(),
                    "channel opened at {}",
                    uri
                ),
            }
        }

        Some(channel)
    }

    /// Look up a channel by its mount URI (exact match)
    pub fn find(&self, uri: &str) -> Option<Arc<Channel>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()
    }

    /// Look up a channel by name
    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|ch| ch.name() == name)
            .cloned()
    }

    /// Number of mounted channels
    pub fn len(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no channels are mounted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear down every channel: all subscriptions are forcibly
    /// terminated and the mounts unregistered.
    pub fn close_all(&self) {
        let drained: Vec<Arc<Channel>> = {
            let mut channels = self
                .channels
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            channels.drain().map(|(_, ch)| ch).collect()
        };
        for channel in &drained {
            channel.close_all();
        }
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("server", &self.server_name)
            .field("prefix", &self.channels_prefix)
            .field("channels", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DeliveryMode;
    use bytes::Bytes;

    fn registry() -> ChannelRegistry {
        ChannelRegistry::new(
            "127.0.0.1:8080".to_string(),
            "/channel/".to_string(),
            LogLevel::DEFAULT,
        )
    }

    #[test]
    fn test_open_and_find() {
        let reg = registry();
        let ch = reg.open(ChannelOptions::new("default")).unwrap();
        assert_eq!(ch.uri(), "/channel/default");
        assert_eq!(ch.mode(), DeliveryMode::Streaming);

        assert!(reg.find("/channel/default").is_some());
        assert!(reg.find("/channel/nope").is_none());
        assert!(reg.get("default").is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_duplicate_open_is_rejected() {
        let reg = registry();
        let first = reg.open(ChannelOptions::new("dup")).unwrap();

        let peer = "127.0.0.1:40000".parse().unwrap();
        let _sub = first.subscribe_streaming(peer).unwrap();

        // second open returns no handle and leaves the original intact
        assert!(reg.open(ChannelOptions::new("dup").publish_key("k")).is_none());
        assert_eq!(reg.len(), 1);
        let found = reg.find("/channel/dup").unwrap();
        assert_eq!(found.subscriber_count(), 1);
        assert!(!found.requires_publish_key());
    }

    #[test]
    fn test_custom_prefix() {
        let reg = ChannelRegistry::new(
            "s".to_string(),
            "/topics/".to_string(),
            LogLevel::DEFAULT,
        );
        let ch = reg.open(ChannelOptions::new("a")).unwrap();
        assert_eq!(ch.uri(), "/topics/a");
        assert!(reg.find("/topics/a").is_some());
        assert!(reg.find("/channel/a").is_none());
    }

    #[tokio::test]
    async fn test_close_all_unmounts_and_terminates() {
        let reg = registry();
        let ch = reg.open(ChannelOptions::new("t")).unwrap();
        let peer = "127.0.0.1:40000".parse().unwrap();
        let mut sub = ch.subscribe_streaming(peer).unwrap();

        reg.close_all();
        assert!(reg.is_empty());
        assert!(reg.find("/channel/t").is_none());

        sub.rx.recv().await.unwrap(); // preamble
        assert!(sub.rx.recv().await.is_none());

        // publishing into the detached handle reaches nobody
        assert_eq!(ch.publish(&Bytes::from_static(b"x"), "t"), 0);
    }
}
