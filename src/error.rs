//! Error types for the Connect Four client.

use thiserror::Error;

/// Errors that can occur when using the Connect Four client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an open connection.
    #[error("not connected to server")]
    NotConnected,

    /// The username failed local validation before being sent.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// The column index is outside the board.
    #[error("invalid column {0}: must be between 0 and 6")]
    InvalidColumn(usize),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The session store could not be read or written.
    #[error("session store error: {0}")]
    Storage(String),
}

/// A specialized [`Result`] type for Connect Four client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
