//! Crate error types

use std::net::SocketAddr;

/// Convenience result alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// The listening socket could not be bound. Non-fatal when several
    /// servers are configured: the failing one is skipped.
    Bind {
        /// Address that could not be bound
        addr: SocketAddr,
        /// Underlying socket error
        source: std::io::Error,
    },
    /// Socket I/O failed
    Io(std::io::Error),
    /// The configuration file could not be read or parsed
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Bind { addr, source } => {
                write!(f, "failed to bind http server to {}: {}", addr, source)
            }
            Error::Io(e) => write!(f, "i/o error: {}", e),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bind { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            Error::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
