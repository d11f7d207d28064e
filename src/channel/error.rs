//! Channel error types

/// Error type for channel operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// A channel with this name already exists on the server
    DuplicateChannel(String),
    /// The channel is at its `max_clients` limit
    ChannelFull(String),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::DuplicateChannel(name) => {
                write!(f, "duplicate channel: {}", name)
            }
            ChannelError::ChannelFull(name) => write!(f, "channel full: {}", name),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Why a publish request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAuthError {
    /// The channel requires a key and the request carried none
    MissingKey,
    /// The provided key did not match the channel's key
    KeyMismatch,
}

impl std::fmt::Display for PublishAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishAuthError::MissingKey => f.write_str("publish key missing"),
            PublishAuthError::KeyMismatch => f.write_str("publish key mismatch"),
        }
    }
}

impl std::error::Error for PublishAuthError {}
