//! # Connect Four Client
//!
//! Reconnecting session core for a real-time Connect Four client.
//!
//! The crate keeps a player's view of a game consistent across network
//! drops and restarts. It speaks the game server's JSON protocol over any
//! bidirectional text transport and turns server messages and user intents
//! into [`Snapshot`]s a presentation layer can render.
//!
//! ## Features
//!
//! - **Reconnecting connection**: [`Connection`] retries with a linear
//!   backoff and notifies subscribers of every open and close
//! - **Session recovery**: an interrupted game is rejoined automatically,
//!   with a manual reconnect prompt once automatic attempts run out
//! - **Persistent sessions**: [`FileStore`] lets a game survive a restart
//! - **Opponent liveness**: a visible grace window while the opponent is away
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any
//!   backend; the default `transport-websocket` feature provides WebSockets
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use connect_four_client::{ClientConfig, ClientEvent, FileStore, GameClient};
//!
//! let store = Arc::new(FileStore::new("session.json"));
//! let (mut client, mut events) = GameClient::start_websocket(store, ClientConfig::from_env()?);
//!
//! client.join("alice")?;
//! while let Some(ClientEvent::StateChanged(snapshot)) = events.recv().await {
//!     println!("{:?}", snapshot.screen());
//! }
//! client.shutdown().await;
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod countdown;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod intent;
pub mod observer;
pub mod protocol;
pub mod reconnect;
pub mod recovery;
pub mod state;
pub mod store;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::GameClient;
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionChange, ConnectionHandle, ConnectionPhase};
pub use error::{ClientError, Result};
pub use event::ClientEvent;
pub use observer::Subscription;
pub use protocol::{ClientMessage, ServerMessage};
pub use reconnect::ReconnectPolicy;
pub use state::{Screen, Snapshot};
pub use store::{FileStore, MemoryStore, SessionRecord, SessionStore};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
