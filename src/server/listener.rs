//! Comet server listener
//!
//! Binds the listening socket, accepts connections and serves each one
//! over HTTP/1.1, dispatching requests to the mounted channels.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use crate::channel::{Channel, ChannelOptions, ChannelRegistry};
use crate::error::{Error, Result};
use crate::http::handler;
use crate::log::LogLevel;
use crate::server::config::ServerConfig;

/// Shared per-server state the request handler sees
pub(crate) struct ServerContext {
    pub name: String,
    pub log_level: LogLevel,
    pub registry: ChannelRegistry,
}

/// One comet pub/sub server: a bound listening socket plus the set of
/// channels mounted on it
pub struct CometServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    context: Arc<ServerContext>,
}

impl CometServer {
    /// Bind the listening socket and install the catch-all handler.
    ///
    /// Returns [`Error::Bind`] if the address cannot be bound; when
    /// several servers are configured the caller is expected to log and
    /// skip the failing one.
    pub async fn start(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| Error::Bind {
                addr: config.bind_addr,
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        let name = config.name.unwrap_or_else(|| local_addr.to_string());

        let registry =
            ChannelRegistry::new(name.clone(), config.channels_prefix, config.log_level);
        let context = Arc::new(ServerContext {
            name,
            log_level: config.log_level,
            registry,
        });

        if config.log_level.allows(LogLevel::Info) {
            tracing::info!(server = %context.name, addr = %local_addr, "server listening");
        }

        Ok(Self {
            listener,
            local_addr,
            context,
        })
    }

    /// Mount a channel at `{prefix}{name}`. A duplicate name logs a
    /// warning and returns `None`.
    pub fn open_channel(&self, opts: ChannelOptions) -> Option<Arc<Channel>> {
        self.context.registry.open(opts)
    }

    /// The channels mounted on this server
    pub fn channels(&self) -> &ChannelRegistry {
        &self.context.registry
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.context.name
    }

    /// The address the listening socket actually bound (useful with
    /// port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the accept loop. Blocks until the task is cancelled.
    pub async fn run(&self) -> Result<()> {
        self.accept_loop().await
    }

    /// Run the accept loop until `shutdown` resolves, then tear down
    /// every channel.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let result = tokio::select! {
            _ = shutdown => Ok(()),
            result = self.accept_loop() => result,
        };
        self.shutdown();
        result
    }

    /// Destroy all channels (forcibly terminating their subscriptions).
    /// The listening socket is released when the server is dropped.
    pub fn shutdown(&self) {
        self.context.registry.close_all();
    }

    async fn accept_loop(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                Err(e) => {
                    tracing::error!(server = %self.context.name, error = %e, "failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let context = Arc::clone(&self.context);

        if context.log_level.allows(LogLevel::Debug) {
            tracing::debug!(server = %context.name, peer = %peer_addr, "new connection");
        }

        tokio::spawn(async move {
            let io = TokioIo::new(socket);
            let ctx = Arc::clone(&context);
            let service = service_fn(move |req| {
                let ctx = Arc::clone(&ctx);
                async move { Ok::<_, Infallible>(handler::handle(ctx, peer_addr, req).await) }
            });

            // an error here is almost always the peer going away
            // mid-stream; broken pipes must never take the process down
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                if context.log_level.allows(LogLevel::Debug) {
                    tracing::debug!(
                        server = %context.name,
                        peer = %peer_addr,
                        error = %e,
                        "connection closed"
                    );
                }
            }
        });
    }
}

impl std::fmt::Debug for CometServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CometServer")
            .field("name", &self.context.name)
            .field("addr", &self.local_addr)
            .field("channels", &self.context.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> ServerConfig {
        ServerConfig::with_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
    }

    #[tokio::test]
    async fn test_start_assigns_name_from_addr() {
        let server = CometServer::start(loopback()).await.unwrap();
        assert_eq!(server.name(), server.local_addr().to_string());
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let first = CometServer::start(loopback()).await.unwrap();
        let taken = first.local_addr();

        let second = CometServer::start(ServerConfig::with_addr(taken)).await;
        match second {
            Err(Error::Bind { addr, .. }) => assert_eq!(addr, taken),
            other => panic!("expected bind failure, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_open_channel_and_shutdown() {
        let server = CometServer::start(loopback()).await.unwrap();
        let ch = server.open_channel(ChannelOptions::new("default")).unwrap();
        assert_eq!(ch.uri(), "/channel/default");
        assert!(server.open_channel(ChannelOptions::new("default")).is_none());
        assert_eq!(server.channels().len(), 1);

        server.shutdown();
        assert!(server.channels().is_empty());
    }
}
