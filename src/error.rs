use thiserror::Error;

/// Result type for AVR operations
pub type Result<T> = std::result::Result<T, AvrError>;

/// Errors that can occur when talking to a Marantz/Denon receiver
#[derive(Error, Debug)]
pub enum AvrError {
    /// The initial TCP connection was refused or timed out
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        /// `host:port` that was dialed
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The device closed the connection or the socket failed
    #[error("Connection lost")]
    ConnectionLost,

    /// A command argument failed validation; nothing was sent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A command was issued after the session closed
    #[error("Session closed")]
    SessionClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error while fetching a device description
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Device description XML could not be decoded
    #[error("XML error: {0}")]
    Xml(String),

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl AvrError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        AvrError::InvalidArgument(message.into())
    }
}
