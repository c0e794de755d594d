#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Connect Four client integration tests.
//!
//! Provides a [`MockConnector`] whose dials hand the test a [`ServerEnd`]
//! for every accepted connection, and helper functions for constructing
//! server message JSON strings.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use connect_four_client::protocol::{
    Board, LeaderboardEntry, Opponent, Outcome, PlayerColor, ServerMessage, BOARD_COLS,
    BOARD_ROWS,
};
use connect_four_client::{
    ClientConfig, ClientError, ClientEvent, ClientMessage, Connector, GameClient, MemoryStore,
    SessionStore, Snapshot, Transport,
};
use tokio::sync::mpsc;

// ── Loopback transport ──────────────────────────────────────────────

/// The client half of an in-memory connection.
struct LoopbackTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        self.outbound
            .send(message)
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        // `None` once the server end is dropped.
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.inbound.close();
        Ok(())
    }
}

/// The server half of an in-memory connection. Dropping it closes the
/// connection from the server side.
pub struct ServerEnd {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl ServerEnd {
    /// Push a raw text frame to the client.
    pub fn push(&self, text: impl Into<String>) {
        self.to_client.send(text.into()).unwrap();
    }

    /// Push a typed server message.
    pub fn push_message(&self, message: &ServerMessage) {
        self.push(serde_json::to_string(message).unwrap());
    }

    /// The next message the client sent, waiting for it if necessary.
    pub async fn next_sent(&mut self) -> ClientMessage {
        let text = tokio::time::timeout(Duration::from_secs(60), self.from_client.recv())
            .await
            .expect("timed out waiting for a client message")
            .expect("client closed the connection");
        serde_json::from_str(&text).expect("client sent malformed JSON")
    }

    /// Everything the client has sent so far.
    pub fn drain_sent(&mut self) -> Vec<ClientMessage> {
        let mut sent = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            sent.push(serde_json::from_str(&text).expect("client sent malformed JSON"));
        }
        sent
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Dials succeed with a fresh loopback pair unless `refuse` is set.
#[derive(Clone)]
pub struct MockConnector {
    pub refuse: Arc<AtomicBool>,
    pub dials: Arc<AtomicUsize>,
    accepted: mpsc::UnboundedSender<ServerEnd>,
}

/// Test-side view of a [`MockConnector`].
pub struct MockServer {
    pub refuse: Arc<AtomicBool>,
    pub dials: Arc<AtomicUsize>,
    accepted: mpsc::UnboundedReceiver<ServerEnd>,
}

impl MockServer {
    /// Wait for the client's next successful dial.
    pub async fn accept(&mut self) -> ServerEnd {
        tokio::time::timeout(Duration::from_secs(60), self.accepted.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    pub fn set_refusing(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

impl MockConnector {
    pub fn new() -> (Self, MockServer) {
        let refuse = Arc::new(AtomicBool::new(false));
        let dials = Arc::new(AtomicUsize::new(0));
        let (accepted, accepted_rx) = mpsc::unbounded_channel();
        let connector = Self {
            refuse: Arc::clone(&refuse),
            dials: Arc::clone(&dials),
            accepted,
        };
        let server = MockServer {
            refuse,
            dials,
            accepted: accepted_rx,
        };
        (connector, server)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _address: &str) -> Result<Box<dyn Transport>, ClientError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let _ = self.accepted.send(ServerEnd {
            to_client,
            from_client,
        });
        Ok(Box::new(LoopbackTransport { inbound, outbound }))
    }
}

// ── Client harness ──────────────────────────────────────────────────

pub struct Harness {
    pub client: GameClient,
    pub events: mpsc::Receiver<ClientEvent>,
    pub server: MockServer,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn start() -> Self {
        Self::start_with(Arc::new(MemoryStore::new()), ClientConfig::default())
    }

    pub fn start_with(store: Arc<MemoryStore>, config: ClientConfig) -> Self {
        let (connector, server) = MockConnector::new();
        let shared: Arc<dyn SessionStore> = store.clone();
        let (client, events) = GameClient::start(connector, shared, config);
        Self {
            client,
            events,
            server,
            store,
        }
    }

    /// Wait for a snapshot matching `predicate`.
    pub async fn wait_for(&mut self, predicate: impl Fn(&Snapshot) -> bool) -> Snapshot {
        let wait = async {
            loop {
                match self.events.recv().await {
                    Some(ClientEvent::StateChanged(snapshot)) if predicate(&snapshot) => {
                        return *snapshot;
                    }
                    Some(_) => {}
                    None => panic!("event channel closed"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(120), wait)
            .await
            .expect("timed out waiting for a matching snapshot")
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.client.snapshot().await.unwrap()
    }
}

/// Let queued work on every task run without advancing time meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Connect, join as `username` and start a game against a bot.
pub async fn start_game(harness: &mut Harness, username: &str, game_id: &str) -> ServerEnd {
    let mut server = harness.server.accept().await;
    harness.wait_for(|s| s.phase.is_connected()).await;
    harness.client.join(username).unwrap();
    assert_eq!(
        server.next_sent().await,
        ClientMessage::Join {
            username: username.into()
        }
    );
    server.push(game_start_json(game_id, "red", "red", "bot"));
    harness.wait_for(|s| s.game().is_some()).await;
    server
}

// ── JSON helper functions ───────────────────────────────────────────

pub fn empty_board_json() -> serde_json::Value {
    serde_json::json!(vec![vec![serde_json::Value::Null; BOARD_COLS]; BOARD_ROWS])
}

/// A board with one disc of `color` at the bottom of `column`.
pub fn board_with_disc(column: usize, color: PlayerColor) -> Board {
    let mut rows = [[None; BOARD_COLS]; BOARD_ROWS];
    rows[BOARD_ROWS - 1][column] = Some(color);
    Board::from_rows(rows)
}

pub fn waiting_json(time_left: u32) -> String {
    serde_json::json!({"type": "waiting", "timeLeft": time_left}).to_string()
}

pub fn game_start_json(game_id: &str, your_color: &str, current: &str, opponent: &str) -> String {
    serde_json::json!({
        "type": "gameStart",
        "gameId": game_id,
        "yourColor": your_color,
        "currentPlayer": current,
        "board": empty_board_json(),
        "opponent": opponent,
    })
    .to_string()
}

pub fn move_message(board: Board, current: PlayerColor, winner: Option<Outcome>) -> ServerMessage {
    ServerMessage::Move {
        board,
        current_player: current,
        winner,
    }
}

pub fn rejoin_success_json(game_id: &str, your_color: &str, current: &str) -> String {
    serde_json::json!({
        "type": "rejoinSuccess",
        "gameId": game_id,
        "yourColor": your_color,
        "currentPlayer": current,
        "board": empty_board_json(),
        "opponent": "bot",
    })
    .to_string()
}

pub fn opponent_disconnected_json() -> String {
    serde_json::json!({"type": "opponentDisconnected"}).to_string()
}

pub fn opponent_left_json(winner: &str) -> String {
    serde_json::json!({"type": "opponentLeft", "winner": winner}).to_string()
}

pub fn error_json(message: &str) -> String {
    serde_json::json!({"type": "error", "message": message}).to_string()
}

pub fn leaderboard_message(entries: Vec<LeaderboardEntry>) -> ServerMessage {
    ServerMessage::Leaderboard { data: entries }
}

pub fn bot() -> Opponent {
    Opponent::Bot
}
