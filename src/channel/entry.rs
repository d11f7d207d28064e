//! Channel implementation
//!
//! A channel owns its subscriber set and runs the broadcast engine: one
//! `publish` call delivers a payload to every live subscriber, applying
//! per-subscriber backpressure and transport-specific framing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, oneshot};

use crate::http::padding;
use crate::log::LogLevel;

use super::error::{ChannelError, PublishAuthError};
use super::stats::{ChannelCounters, ChannelStats};
use super::subscriber::{DeliveryMode, Subscriber, Transport};

/// Backpressure threshold: a streaming subscriber with at least this many
/// bytes buffered but unsent loses the current message instead of
/// growing the queue further.
pub const MAX_CLIENT_BUFSIZ: usize = 1_000_000;

/// Parameters for opening a channel on a server
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Channel name, unique within its server
    pub name: String,
    /// Shared secret required in `X-CPS-Publish-Key` to publish.
    /// `None` (or empty) disables the check.
    pub publish_key: Option<String>,
    /// Delivery transport for this channel's subscribers
    pub mode: DeliveryMode,
    /// Maximum concurrent subscribers (0 = unlimited)
    pub max_clients: usize,
    /// Log threshold for this channel
    pub log_level: LogLevel,
}

impl ChannelOptions {
    /// Options for a streaming channel with no publish key and no
    /// client limit
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            publish_key: None,
            mode: DeliveryMode::Streaming,
            max_clients: 0,
            log_level: LogLevel::DEFAULT,
        }
    }

    /// Require a publish key. An empty key disables the check.
    pub fn publish_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.publish_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    /// Set the delivery transport
    pub fn mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the subscriber limit (0 = unlimited)
    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    /// Set the log threshold
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}

/// A named pub/sub topic mounted at an HTTP path
pub struct Channel {
    name: String,
    uri: String,
    server_name: String,
    publish_key: Option<String>,
    mode: DeliveryMode,
    max_clients: usize,
    log_level: LogLevel,
    subscribers: Mutex<Vec<Subscriber>>,
    next_sub_id: AtomicU64,
    counters: ChannelCounters,
}

/// A live streaming attachment. Dropping it (the response body went
/// away, i.e. the connection closed) removes the subscriber from the
/// channel.
pub struct StreamingSubscription {
    pub(crate) channel: Arc<Channel>,
    pub(crate) id: u64,
    pub(crate) rx: mpsc::UnboundedReceiver<Bytes>,
    pub(crate) queued: Arc<AtomicUsize>,
}

impl Drop for StreamingSubscription {
    fn drop(&mut self) {
        self.channel.remove_subscriber(self.id);
    }
}

/// A parked long-poll attachment. Resolves with the single delivered
/// message; dropping it while still parked removes the subscriber.
pub struct LongPollSubscription {
    pub(crate) channel: Arc<Channel>,
    pub(crate) id: u64,
    pub(crate) rx: oneshot::Receiver<Bytes>,
}

impl LongPollSubscription {
    /// Wait for the single delivery. `None` means the channel was torn
    /// down before anything was published.
    pub async fn recv(&mut self) -> Option<Bytes> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for LongPollSubscription {
    fn drop(&mut self) {
        self.channel.remove_subscriber(self.id);
    }
}

impl Channel {
    pub(crate) fn new(server_name: String, uri: String, opts: ChannelOptions) -> Self {
        let publish_key = opts.publish_key.filter(|k| !k.is_empty());
        Self {
            name: opts.name,
            uri,
            server_name,
            publish_key,
            mode: opts.mode,
            max_clients: opts.max_clients,
            log_level: opts.log_level,
            subscribers: Mutex::new(Vec::new()),
            next_sub_id: AtomicU64::new(1),
            counters: ChannelCounters::default(),
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mount URI (`{prefix}{name}`)
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Delivery transport configured for this channel
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Whether publishing requires a key
    pub fn requires_publish_key(&self) -> bool {
        self.publish_key.is_some()
    }

    /// Number of currently attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subs().len()
    }

    /// Counter snapshot
    pub fn stats(&self) -> ChannelStats {
        self.counters.snapshot()
    }

    pub(crate) fn log_allows(&self, level: LogLevel) -> bool {
        self.log_level.allows(level)
    }

    fn subs(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        // the lock is never held across an await, so a poisoned lock can
        // only mean a panic mid-update in another task; the set itself
        // is still structurally sound
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check a publish request's key against the channel's key
    pub fn authorize_publish(&self, provided: Option<&str>) -> Result<(), PublishAuthError> {
        let Some(required) = self.publish_key.as_deref() else {
            return Ok(());
        };
        match provided {
            None => Err(PublishAuthError::MissingKey),
            Some(key) if key == required => Ok(()),
            Some(_) => Err(PublishAuthError::KeyMismatch),
        }
    }

    /// Attach a streaming subscriber.
    ///
    /// The returned subscription carries the receiving half of the
    /// response body; its first chunk is the padded HTML preamble. The
    /// subscriber stays attached until the subscription is dropped.
    pub fn subscribe_streaming(
        self: &Arc<Self>,
        peer: SocketAddr,
    ) -> Result<StreamingSubscription, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let queued = Arc::new(AtomicUsize::new(0));

        let preamble = padding::preamble_chunk();
        queued.fetch_add(preamble.len(), Ordering::AcqRel);
        // receiver is in scope, the send cannot fail
        let _ = tx.send(preamble);

        let id = {
            let mut subs = self.subs();
            self.ensure_capacity(&subs)?;
            let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
            subs.push(Subscriber {
                id,
                peer,
                transport: Transport::Streaming {
                    tx,
                    queued: Arc::clone(&queued),
                },
            });
            id
        };

        if self.log_allows(LogLevel::Info) {
            tracing::info!(
                server = %self.server_name,
                channel = %self.name,
                peer = %peer,
                "subscribed"
            );
        }

        Ok(StreamingSubscription {
            channel: Arc::clone(self),
            id,
            rx,
            queued,
        })
    }

    /// Attach a long-poll subscriber with the given JSONP callback name.
    ///
    /// The subscription resolves after exactly one publish; the engine
    /// removes the subscriber as part of that delivery.
    pub fn subscribe_long_poll(
        self: &Arc<Self>,
        peer: SocketAddr,
        callback: String,
    ) -> Result<LongPollSubscription, ChannelError> {
        let (tx, rx) = oneshot::channel();

        let id = {
            let mut subs = self.subs();
            self.ensure_capacity(&subs)?;
            let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
            subs.push(Subscriber {
                id,
                peer,
                transport: Transport::LongPoll {
                    callback,
                    reply: Some(tx),
                },
            });
            id
        };

        if self.log_allows(LogLevel::Info) {
            tracing::info!(
                server = %self.server_name,
                channel = %self.name,
                peer = %peer,
                "listening"
            );
        }

        Ok(LongPollSubscription {
            channel: Arc::clone(self),
            id,
            rx,
        })
    }

    fn ensure_capacity(&self, subs: &[Subscriber]) -> Result<(), ChannelError> {
        if self.max_clients > 0 && subs.len() >= self.max_clients {
            if self.log_allows(LogLevel::Warn) {
                tracing::warn!(
                    server = %self.server_name,
                    channel = %self.name,
                    clients = subs.len(),
                    "channel full -- refusing subscriber"
                );
            }
            return Err(ChannelError::ChannelFull(self.name.clone()));
        }
        Ok(())
    }

    /// Remove a subscriber by id. This is the connection-close path for
    /// streaming subscribers; for long-poll it is a no-op after the
    /// engine already removed the entry.
    pub(crate) fn remove_subscriber(&self, id: u64) {
        let removed = {
            let mut subs = self.subs();
            match subs.iter().position(|s| s.id == id) {
                Some(pos) => Some(subs.remove(pos)),
                None => None,
            }
        };
        if let Some(sub) = removed {
            if self.log_allows(LogLevel::Info) {
                tracing::info!(
                    server = %self.server_name,
                    channel = %self.name,
                    peer = %sub.peer,
                    mode = %sub.mode(),
                    "unsubscribed"
                );
            }
        }
    }

    /// Broadcast a payload to every live subscriber, in attachment order.
    ///
    /// Streaming subscribers over the backpressure threshold lose this
    /// message but stay subscribed; long-poll subscribers receive their
    /// single delivery and are removed in the same traversal. Returns the
    /// number of subscribers visited.
    pub fn publish(&self, payload: &Bytes, sender: &str) -> usize {
        if self.log_allows(LogLevel::Info) {
            tracing::info!(
                server = %self.server_name,
                channel = %self.name,
                sender = %sender,
                "publishing {} bytes",
                payload.len()
            );
        }
        self.counters.record_publish(payload.len() as u64);

        let mut visited = 0usize;
        {
            let mut subs = self.subs();
            // retain_mut tolerates removing the element under the cursor,
            // which long-poll delivery requires
            subs.retain_mut(|sub| {
                visited += 1;
                match &mut sub.transport {
                    Transport::Streaming { tx, queued } => {
                        let pending = queued.load(Ordering::Acquire);
                        if pending >= MAX_CLIENT_BUFSIZ {
                            self.counters.record_drop();
                            if self.log_allows(LogLevel::Warn) {
                                tracing::warn!(
                                    server = %self.server_name,
                                    channel = %self.name,
                                    peer = %sub.peer,
                                    queued = pending,
                                    "bufsize >= maxbufsize -- dropping message ({} bytes) from {}",
                                    payload.len(),
                                    sender
                                );
                            }
                            return true;
                        }

                        let chunk = padding::aligned_payload(payload);
                        if self.log_allows(LogLevel::Debug) {
                            tracing::debug!(
                                server = %self.server_name,
                                channel = %self.name,
                                peer = %sub.peer,
                                "sending message ({} bytes)",
                                payload.len()
                            );
                        }
                        queued.fetch_add(chunk.len(), Ordering::AcqRel);
                        if tx.send(chunk).is_ok() {
                            self.counters.record_delivery();
                        }
                        // a failed send means the connection already
                        // closed; the close path owns the removal
                        true
                    }
                    Transport::LongPoll { callback, reply } => {
                        let body = jsonp_body(callback, payload);
                        if let Some(tx) = reply.take() {
                            if tx.send(body).is_ok() {
                                self.counters.record_delivery();
                            }
                        }
                        if self.log_allows(LogLevel::Debug) {
                            tracing::debug!(
                                server = %self.server_name,
                                channel = %self.name,
                                peer = %sub.peer,
                                "completed long-poll delivery ({} bytes)",
                                payload.len()
                            );
                        }
                        false
                    }
                }
            });
        }

        if self.log_allows(LogLevel::Debug) {
            tracing::debug!(
                server = %self.server_name,
                channel = %self.name,
                "published {} bytes to {} subscribers",
                payload.len(),
                visited
            );
        }
        visited
    }

    /// Forcibly terminate every subscription, regardless of mode.
    ///
    /// Streaming response bodies end; parked long-poll requests resolve
    /// empty. Normal per-mode delivery logic is not invoked.
    pub(crate) fn close_all(&self) {
        let drained: Vec<Subscriber> = {
            let mut subs = self.subs();
            subs.drain(..).collect()
        };
        let count = drained.len();
        // dropped outside the lock: dropping the senders wakes the
        // subscriber tasks, whose own cleanup re-enters the channel
        drop(drained);
        if count > 0 && self.log_allows(LogLevel::Debug) {
            tracing::debug!(
                server = %self.server_name,
                channel = %self.name,
                "channel closed, {} subscriptions terminated",
                count
            );
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("uri", &self.uri)
            .field("mode", &self.mode)
            .field("max_clients", &self.max_clients)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Build the JSONP reply body: `{callback}({payload});` with the payload
/// inserted verbatim
fn jsonp_body(callback: &str, payload: &Bytes) -> Bytes {
    let mut body = BytesMut::with_capacity(callback.len() + payload.len() + 3);
    body.extend_from_slice(callback.as_bytes());
    body.extend_from_slice(b"(");
    body.extend_from_slice(payload);
    body.extend_from_slice(b");");
    body.freeze()
}
