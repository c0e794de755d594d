//! Transport abstraction for the Connect Four client.
//!
//! The [`Transport`] trait defines a bidirectional text message channel between
//! the client and server. The game protocol uses JSON text messages, so every
//! transport implementation must handle message framing internally.
//!
//! # Connection Setup
//!
//! Opening a channel is not part of [`Transport`]. Because the client has to
//! reopen the channel after every drop, it is handed a [`Connector`] instead:
//! a factory that dials an address and yields a fresh, already-open
//! [`Transport`] each time.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use connect_four_client::error::ClientError;
//! use connect_four_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), ClientError> {
//!         unimplemented!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, ClientError>> {
//!         unimplemented!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ClientError> {
//!         unimplemented!()
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     async fn connect(&self, address: &str) -> Result<Box<dyn Transport>, ClientError> {
//!         Ok(Box::new(MyTransport { /* dial `address` */ }))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ClientError;

/// A bidirectional text message transport.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message.
/// Each call to [`recv`](Transport::recv) returns one complete JSON message.
///
/// # Object Safety
///
/// This trait is object-safe; the connection task holds a
/// `Box<dyn Transport>` so that successive reconnects may yield different
/// concrete transports.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because it is used
/// inside `tokio::select!`. If `recv` is cancelled before completion, calling it
/// again must not lose data.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, message: String) -> Result<(), ClientError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the connection was closed cleanly by the server
    async fn recv(&mut self) -> Option<Result<String, ClientError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Opens new [`Transport`]s.
///
/// Called once for the initial connection and again for every reconnect
/// attempt, always with the last address that was used.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Dial `address` and return an open transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel could not be opened.
    async fn connect(&self, address: &str) -> Result<Box<dyn Transport>, ClientError>;
}
