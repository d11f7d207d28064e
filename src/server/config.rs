//! Server configuration

use std::net::SocketAddr;

use crate::log::LogLevel;

/// Default mount prefix channels are published under
pub const DEFAULT_CHANNELS_PREFIX: &str = "/channel/";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Display name used in log lines. Defaults to the bound
    /// `address:port` when unset.
    pub name: Option<String>,

    /// Prefix channel mount URIs are derived from
    /// (`{prefix}{channel name}`)
    pub channels_prefix: String,

    /// Log threshold for this server
    pub log_level: LogLevel,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            name: None,
            channels_prefix: DEFAULT_CHANNELS_PREFIX.to_string(),
            log_level: LogLevel::DEFAULT,
        }
    }
}

impl ServerConfig {
    /// Create a new config with a custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the channel mount prefix
    pub fn channels_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channels_prefix = prefix.into();
        self
    }

    /// Set the log threshold
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.bind_addr.ip().is_loopback());
        assert!(config.name.is_none());
        assert_eq!(config.channels_prefix, "/channel/");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "0.0.0.0:1234".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .name("edge")
            .channels_prefix("/topics/")
            .log_level(LogLevel::Debug);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.name.as_deref(), Some("edge"));
        assert_eq!(config.channels_prefix, "/topics/");
        assert_eq!(config.log_level, LogLevel::Debug);
    }
}
