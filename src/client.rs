//! Async Connect Four client.
//!
//! [`GameClient`] is a thin handle that talks to a background session task
//! over an unbounded MPSC channel. The session task owns the [`Connection`],
//! the [`AppState`], the [`SessionRecovery`] controller, both countdowns and
//! the [`SessionStore`]. Inbound messages and connection changes reach it
//! through [`Subscription`]s on the connection, so every input is handled to
//! completion in arrival order. Snapshots are emitted on a bounded channel
//! ([`tokio::sync::mpsc::Receiver<ClientEvent>`]) returned from
//! [`GameClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let store = Arc::new(FileStore::new("session.json"));
//! let (client, mut events) = GameClient::start_websocket(store, ClientConfig::from_env()?);
//!
//! client.join("alice")?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::StateChanged(snapshot) => render(&snapshot),
//!         ClientEvent::Stopped => break,
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionChange, ConnectionHandle, ConnectionPhase};
use crate::countdown::{wait_until, Countdown, OpponentLiveness};
use crate::dispatcher::{dispatch, Effect};
use crate::error::{ClientError, Result};
use crate::event::ClientEvent;
use crate::intent::{self, IntentOutcome};
use crate::observer::Subscription;
use crate::protocol::{ClientMessage, ServerMessage, BOARD_COLS};
use crate::recovery::{ManualReconnect, SessionRecovery};
use crate::state::{AppState, NoticeLifetime, Screen, Snapshot};
use crate::store::{SessionRecord, SessionStore};
use crate::transport::Connector;

const CONNECT_FAILED: &str = "Failed to connect to game server";
const RECONNECT_FAILED: &str = "Failed to reconnect to server";

enum Command {
    Join(String),
    Move(usize),
    RequestLeaderboard,
    ToggleLeaderboard,
    PlayAgain,
    ExitGame,
    RequestExit,
    CancelExit,
    ManualReconnect,
    Snapshot(oneshot::Sender<Snapshot>),
}

/// What the connection reports to the session task.
enum NetEvent {
    Message(ServerMessage),
    Change(ConnectionChange),
    ConnectResult { manual: bool, result: Result<()> },
}

// ── GameClient ──────────────────────────────────────────────────────

/// Async client handle.
///
/// Created via [`GameClient::start`], which spawns the session task and
/// starts connecting to [`ClientConfig::server_url`].
///
/// Intent methods queue a command and return immediately. They fail only
/// with [`ClientError::NotConnected`] once the session task has stopped, or
/// with a validation error that is also shown to the user as a notice.
pub struct GameClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    connection: ConnectionHandle,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl GameClient {
    /// Start the session task and return a handle plus the event receiver.
    ///
    /// A session record found in `store` is treated as a game interrupted by
    /// a restart: the first open of the connection sends a rejoin.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        connector: impl Connector,
        store: Arc<dyn SessionStore>,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let connection = Connection::new(connector, config.reconnect_policy())
            .with_shutdown_timeout(config.shutdown_timeout);
        let handle = connection.handle();
        let shutdown_timeout = config.shutdown_timeout;

        let session = Session::new(config, connection, store, event_tx);
        let task = tokio::spawn(session_loop(session, cmd_rx, shutdown_rx));

        let client = Self {
            cmd_tx,
            connection: handle,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        };
        (client, event_rx)
    }

    /// [`start`](Self::start) with a [`WebSocketConnector`](crate::WebSocketConnector)
    /// honouring [`ClientConfig::connect_timeout`].
    #[cfg(feature = "transport-websocket")]
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start_websocket(
        store: Arc<dyn SessionStore>,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let connector = crate::transports::WebSocketConnector::new(config.connect_timeout);
        Self::start(connector, store, config)
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Enter matchmaking as `username`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUsername`] if the trimmed name is not
    /// 2 to 20 characters long, or [`ClientError::NotConnected`] if the
    /// client has stopped.
    pub fn join(&self, username: impl Into<String>) -> Result<()> {
        let username = username.into();
        let valid = intent::validate_username(&username);
        self.send(Command::Join(username))?;
        valid.map(drop)
    }

    /// Drop a disc into `column` (0-based). Ignored unless it is a legal
    /// move for the local player right now.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidColumn`] if `column` is off the board,
    /// or [`ClientError::NotConnected`] if the client has stopped.
    pub fn make_move(&self, column: usize) -> Result<()> {
        if column >= BOARD_COLS {
            return Err(ClientError::InvalidColumn(column));
        }
        self.send(Command::Move(column))
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the client has stopped.
    pub fn request_leaderboard(&self) -> Result<()> {
        self.send(Command::RequestLeaderboard)
    }

    /// Show or hide the leaderboard, fetching it when opening.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the client has stopped.
    pub fn toggle_leaderboard(&self) -> Result<()> {
        self.send(Command::ToggleLeaderboard)
    }

    /// Queue for another game under the same username.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the client has stopped.
    pub fn play_again(&self) -> Result<()> {
        self.send(Command::PlayAgain)
    }

    /// Leave the game or matchmaking and return to the login screen.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the client has stopped.
    pub fn exit_game(&self) -> Result<()> {
        self.send(Command::ExitGame)
    }

    /// Ask for confirmation before leaving a game or matchmaking.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the client has stopped.
    pub fn request_exit(&self) -> Result<()> {
        self.send(Command::RequestExit)
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the client has stopped.
    pub fn cancel_exit(&self) -> Result<()> {
        self.send(Command::CancelExit)
    }

    /// Retry the rejoin from the reconnect prompt, reopening the connection
    /// first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the client has stopped.
    pub fn manual_reconnect(&self) -> Result<()> {
        self.send(Command::ManualReconnect)
    }

    /// Shut down the client, closing the connection and cancelling every
    /// timer.
    ///
    /// The event receiver yields [`ClientEvent::Stopped`] and then `None`.
    pub async fn shutdown(&mut self) {
        debug!("GameClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session task terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session task did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session task aborted: {join_err}");
                    }
                }
            }
        }
    }

    // ── State accessors ─────────────────────────────────────────────

    /// The current snapshot, as the session task sees it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the client has stopped.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        rx.await.map_err(|_| ClientError::NotConnected)
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.connection.phase()
    }

    /// Returns `true` if the connection to the server is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.cmd_tx
            .send(command)
            .map_err(|_| ClientError::NotConnected)
    }
}

impl std::fmt::Debug for GameClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClient")
            .field("phase", &self.phase())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        // Aborting drops the session, which aborts the connection task in turn.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session task ────────────────────────────────────────────────────

/// Everything the session task owns.
struct Session {
    config: ClientConfig,
    connection: Connection,
    store: Arc<dyn SessionStore>,
    app: AppState,
    recovery: SessionRecovery,
    liveness: OpponentLiveness,
    matchmaking: Countdown,
    error_expiry: Option<Instant>,
    event_tx: mpsc::Sender<ClientEvent>,
    net_tx: mpsc::UnboundedSender<NetEvent>,
    net_rx: mpsc::UnboundedReceiver<NetEvent>,
    last_emitted: Option<Snapshot>,
    _subscriptions: Vec<Subscription>,
}

impl Session {
    fn new(
        config: ClientConfig,
        connection: Connection,
        store: Arc<dyn SessionStore>,
        event_tx: mpsc::Sender<ClientEvent>,
    ) -> Self {
        let (net_tx, net_rx) = mpsc::unbounded_channel();

        let message_tx = net_tx.clone();
        let change_tx = net_tx.clone();
        let subscriptions = vec![
            connection.subscribe_messages(move |message| {
                let _ = message_tx.send(NetEvent::Message(message.clone()));
            }),
            connection.subscribe_connection(move |change| {
                let _ = change_tx.send(NetEvent::Change(*change));
            }),
        ];

        Self {
            recovery: config.session_recovery(),
            liveness: OpponentLiveness::new(config.opponent_grace_secs),
            matchmaking: Countdown::new(),
            config,
            connection,
            store,
            app: AppState::new(),
            error_expiry: None,
            event_tx,
            net_tx,
            net_rx,
            last_emitted: None,
            _subscriptions: subscriptions,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            app: self.app.clone(),
            phase: self.connection.phase(),
            reconnect_prompt_visible: self.recovery.is_prompt_visible(),
            rejoin_attempts: self.recovery.attempts(),
            opponent_disconnected: self.liveness.is_opponent_disconnected(),
            opponent_time_left: self.liveness.time_left(),
            matchmaking_time_left: self
                .matchmaking
                .remaining()
                .unwrap_or(self.config.matchmaking_secs),
        }
    }

    fn deadline(&self) -> Option<Instant> {
        [
            self.recovery.deadline(),
            self.liveness.deadline(),
            self.matchmaking.deadline(),
            self.error_expiry,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    fn startup(&mut self) {
        let record = self.store.load_record();
        if let Some(record) = &record {
            self.app.username = Some(record.username.clone());
        }
        self.recovery.on_startup(record.as_ref());
        self.open_connection(false);
    }

    /// Queue a connect; its outcome comes back as a [`NetEvent`].
    fn open_connection(&self, manual: bool) {
        let connect = self.connection.connect(self.config.server_url.clone());
        let net_tx = self.net_tx.clone();
        tokio::spawn(async move {
            let result = connect.await;
            let _ = net_tx.send(NetEvent::ConnectResult { manual, result });
        });
    }

    async fn teardown(&mut self) {
        self.recovery.reset();
        self.liveness.clear();
        self.matchmaking.clear();
        self.error_expiry = None;
        self.connection.close().await;
    }

    // ── Inputs ──────────────────────────────────────────────────────

    fn on_net_event(&mut self, event: NetEvent, now: Instant) {
        match event {
            NetEvent::Message(message) => {
                let transition = dispatch(&self.app, &message);
                self.app = transition.state;
                self.apply_effects(transition.effects, now);
            }
            NetEvent::Change(ConnectionChange::Opened) => {
                self.app.clear_error();
                let record = self.store.load_record();
                if let Some(record) = self.recovery.on_transport_open(record.as_ref(), now) {
                    self.send_rejoin(record);
                }
            }
            NetEvent::Change(ConnectionChange::Closed) => {
                let has_record = self.store.load_record().is_some();
                self.recovery
                    .on_transport_closed(self.app.is_playing(), has_record, now);
            }
            NetEvent::ConnectResult { manual, result } => {
                if let Err(e) = result {
                    warn!(manual, "connect failed: {e}");
                    if manual {
                        self.recovery.on_manual_open_failed();
                        self.show_notice(RECONNECT_FAILED, NoticeLifetime::Standard, now);
                    } else {
                        self.show_notice(CONNECT_FAILED, NoticeLifetime::Standard, now);
                    }
                }
            }
        }
    }

    fn on_command(&mut self, command: Command, now: Instant) {
        let connected = self.connection.is_open();
        let outcome = match command {
            Command::Join(username) => match intent::join(&self.app, &username, connected) {
                Ok(outcome) => outcome,
                Err(e) => {
                    debug!("join rejected: {e}");
                    if let ClientError::InvalidUsername(message) = e {
                        self.show_notice(&message, NoticeLifetime::Standard, now);
                    }
                    return;
                }
            },
            Command::Move(column) => {
                match intent::make_move(&self.app, column, self.liveness.is_opponent_disconnected())
                {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        debug!("move rejected: {e}");
                        return;
                    }
                }
            }
            Command::RequestLeaderboard => intent::request_leaderboard(&self.app),
            Command::ToggleLeaderboard => intent::toggle_leaderboard(&self.app),
            Command::PlayAgain => intent::play_again(&self.app, connected),
            Command::ExitGame => intent::exit_game(&self.app),
            Command::RequestExit => intent::request_exit(&self.app),
            Command::CancelExit => intent::cancel_exit(&self.app),
            Command::ManualReconnect => {
                self.manual_reconnect(now);
                return;
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
                return;
            }
        };
        self.apply_intent(outcome, now);
    }

    fn on_deadline(&mut self, now: Instant) {
        self.liveness.on_deadline(now);
        self.matchmaking.on_deadline(now);

        if self.error_expiry.is_some_and(|due| due <= now) {
            self.error_expiry = None;
            self.app.clear_error();
        }

        let record = self.store.load_record();
        if let Some(record) =
            self.recovery
                .on_deadline(now, record.as_ref(), self.connection.is_open())
        {
            self.send_rejoin(record);
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn manual_reconnect(&mut self, now: Instant) {
        info!("manual reconnect requested");
        self.app.joining = false;
        let record = self.store.load_record();
        match self
            .recovery
            .manual_reconnect(record.as_ref(), self.connection.is_open(), now)
        {
            ManualReconnect::Rejoin(record) => self.send_rejoin(record),
            ManualReconnect::OpenTransport => self.open_connection(true),
            ManualReconnect::Idle => debug!("manual reconnect with no saved session"),
        }
    }

    fn apply_intent(&mut self, outcome: IntentOutcome, now: Instant) {
        self.app = outcome.state;
        if let Some(message) = &outcome.send {
            self.connection.send(message);
        }
        self.apply_effects(outcome.effects, now);
    }

    fn apply_effects(&mut self, effects: Vec<Effect>, now: Instant) {
        for effect in effects {
            match effect {
                Effect::SaveSession(record) => self.store.save_record(&record),
                Effect::ClearSession => self.store.clear_record(),
                Effect::ClearDisconnectFlag => self.recovery.clear_disconnect_flag(),
                Effect::ResetRecovery => {
                    self.recovery.reset_attempts();
                    self.recovery.hide_prompt();
                }
                Effect::RejoinSucceeded => self.recovery.on_rejoin_success(),
                Effect::StartOpponentWindow => self.liveness.on_opponent_disconnected(now),
                Effect::ClearOpponentWindow => {
                    self.liveness.clear();
                }
                Effect::StartMatchmakingCountdown(secs) => self.matchmaking.start(secs, now),
                Effect::StopMatchmakingCountdown => {
                    self.matchmaking.clear();
                }
                Effect::ExpireError(lifetime) => {
                    self.error_expiry = Some(now + lifetime.duration(self.config.error_display));
                }
            }
        }

        // Countdowns never outlive their screen.
        if self.app.screen != Screen::Waiting {
            self.matchmaking.clear();
        }
        if self.app.screen != Screen::Playing {
            self.liveness.clear();
        }
    }

    fn show_notice(&mut self, message: &str, lifetime: NoticeLifetime, now: Instant) {
        self.app.set_error(message);
        self.error_expiry = Some(now + lifetime.duration(self.config.error_display));
    }

    fn send_rejoin(&self, record: SessionRecord) {
        self.connection.send(&ClientMessage::Rejoin {
            username: record.username,
            game_id: record.game_id,
        });
    }

    /// Emit a snapshot if it differs from the last one emitted.
    fn publish(&mut self) {
        let snapshot = self.snapshot();
        if self.last_emitted.as_ref() == Some(&snapshot) {
            return;
        }
        self.last_emitted = Some(snapshot.clone());
        emit_event(&self.event_tx, ClientEvent::StateChanged(Box::new(snapshot)));
    }
}

/// Background task multiplexing commands, connection events and timers via
/// `tokio::select!`.
///
/// Exits when shutdown is signalled or every client handle is dropped.
async fn session_loop(
    mut session: Session,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("session loop started");

    session.startup();
    session.publish();

    loop {
        let deadline = session.deadline();

        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(command) => session.on_command(command, Instant::now()),
                    None => {
                        debug!("command channel closed, shutting down session loop");
                        break;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                break;
            }

            Some(event) = session.net_rx.recv() => {
                session.on_net_event(event, Instant::now());
            }

            _ = wait_until(deadline) => {
                session.on_deadline(Instant::now());
            }
        }

        session.publish();
    }

    session.teardown().await;
    emit_stopped(&session.event_tx).await;
    debug!("session loop exited");
}

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid blocking the session loop.
fn emit_event(event_tx: &mpsc::Sender<ClientEvent>, event: ClientEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("event channel full, dropping snapshot");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// `Stopped` is the last event on the channel and must never be dropped.
async fn emit_stopped(event_tx: &mpsc::Sender<ClientEvent>) {
    if event_tx.send(ClientEvent::Stopped).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A connector whose dials never complete.
    struct HangingConnector {
        dialled: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Connector for HangingConnector {
        async fn connect(
            &self,
            _address: &str,
        ) -> std::result::Result<Box<dyn Transport>, ClientError> {
            self.dialled.store(true, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    /// A connector that always refuses.
    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        async fn connect(
            &self,
            _address: &str,
        ) -> std::result::Result<Box<dyn Transport>, ClientError> {
            Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )))
        }
    }

    fn start_refusing() -> (GameClient, mpsc::Receiver<ClientEvent>) {
        GameClient::start(
            RefusingConnector,
            Arc::new(MemoryStore::new()),
            ClientConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn startup_connects_and_reports_failure() {
        let (mut client, _events) = start_refusing();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let snapshot = client.snapshot().await.unwrap();
        assert_eq!(snapshot.app.error_message(), Some(CONNECT_FAILED));
        assert_eq!(snapshot.screen(), Screen::Login);
        assert!(!client.is_connected());

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_notice_expires() {
        let (mut client, _events) = start_refusing();

        tokio::time::sleep(Duration::from_millis(5100)).await;
        let snapshot = client.snapshot().await.unwrap();
        assert_eq!(snapshot.app.error, None);

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_emits_stopped_last() {
        let (mut client, mut events) = start_refusing();
        client.shutdown().await;

        let mut last = None;
        while let Some(event) = events.recv().await {
            last = Some(event);
        }
        assert_eq!(last, Some(ClientEvent::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn not_connected_error_after_shutdown() {
        let (mut client, _events) = start_refusing();
        client.shutdown().await;

        assert!(matches!(
            client.request_leaderboard(),
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            client.snapshot().await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_arguments_fail_fast() {
        let (mut client, _events) = start_refusing();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(matches!(
            client.join(" x "),
            Err(ClientError::InvalidUsername(_))
        ));
        assert!(matches!(
            client.make_move(BOARD_COLS),
            Err(ClientError::InvalidColumn(7))
        ));

        let snapshot = client.snapshot().await.unwrap();
        assert_eq!(
            snapshot.app.error_message(),
            Some("Username must be at least 2 characters")
        );
        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_timeout_aborts_stuck_connection() {
        let dialled = Arc::new(AtomicBool::new(false));
        let connector = HangingConnector {
            dialled: Arc::clone(&dialled),
        };
        let config = ClientConfig::default().with_shutdown_timeout(Duration::from_millis(50));
        let (mut client, mut events) =
            GameClient::start(connector, Arc::new(MemoryStore::new()), config);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(dialled.load(Ordering::SeqCst));
        assert_eq!(client.phase(), ConnectionPhase::Connecting);

        client.shutdown().await;

        // The channel closes whether or not `Stopped` made it out.
        while events.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_client_stops_session() {
        let (client, mut events) = start_refusing();
        drop(client);
        while events.recv().await.is_some() {}
    }
}
