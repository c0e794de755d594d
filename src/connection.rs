//! The transport connection: one logical channel to the game server.
//!
//! [`Connection`] owns a background task that holds the current
//! [`Transport`], serializes outbound [`ClientMessage`]s, parses inbound
//! [`ServerMessage`]s and fans both out to subscribers. When the channel
//! drops, the task consults its [`ReconnectController`] and redials the last
//! address on a linear backoff.
//!
//! [`ConnectionHandle`] is the cheap, cloneable side of the connection used
//! to send, subscribe and trigger explicit connects.
//!
//! ```rust,ignore
//! let connection = Connection::new(WebSocketConnector::default(), ReconnectPolicy::default());
//! let _messages = connection.subscribe_messages(|msg| println!("{}", msg.kind()));
//! connection.connect("ws://localhost:3001").await?;
//! connection.send(&ClientMessage::GetLeaderboard);
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::countdown::wait_until;
use crate::error::{ClientError, Result};
use crate::observer::{Listeners, Subscription};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::reconnect::{ReconnectAction, ReconnectController, ReconnectPolicy};
use crate::transport::{Connector, Transport};

/// Default timeout for the graceful close.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection lifecycle as seen by the rest of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionPhase {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Connected => 1,
            Self::Disconnected => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

/// Notification delivered to connection-change subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionChange {
    Opened,
    Closed,
}

// ── Shared state ────────────────────────────────────────────────────

struct Shared {
    phase: AtomicU8,
    messages: Listeners<ServerMessage>,
    changes: Listeners<ConnectionChange>,
}

impl Shared {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(ConnectionPhase::Disconnected.to_u8()),
            messages: Listeners::new(),
            changes: Listeners::new(),
        }
    }

    fn phase(&self) -> ConnectionPhase {
        ConnectionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        self.phase.store(phase.to_u8(), Ordering::Release);
    }
}

enum Command {
    Connect {
        address: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Send {
        kind: &'static str,
        json: String,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

// ── Handle ──────────────────────────────────────────────────────────

/// Cloneable access to a [`Connection`].
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    /// Open the channel to `address`. The returned future resolves once the
    /// channel is open.
    ///
    /// The request is queued, and the phase moves to `Connecting`, before
    /// this returns; the future only waits for the outcome. It resolves
    /// immediately if the channel is already open. A failed open still arms
    /// the reconnect loop.
    ///
    /// # Errors
    ///
    /// The future yields the connector's error if the channel could not be
    /// opened, or [`ClientError::TransportClosed`] if the connection was closed.
    pub fn connect(
        &self,
        address: impl Into<String>,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let (reply, rx) = oneshot::channel();
        let queued = self
            .cmd_tx
            .send(Command::Connect {
                address: address.into(),
                reply,
            })
            .map_err(|_| ClientError::TransportClosed);
        if queued.is_ok() && self.phase() == ConnectionPhase::Disconnected {
            self.shared.set_phase(ConnectionPhase::Connecting);
        }
        async move {
            queued?;
            rx.await.map_err(|_| ClientError::TransportClosed)?
        }
    }

    /// Serialize and enqueue `message`.
    ///
    /// While the channel is not open the message is logged and dropped;
    /// this never fails.
    pub fn send(&self, message: &ClientMessage) {
        let kind = message.kind();
        if !self.is_open() {
            warn!(kind, "connection not open, dropping outbound message");
            return;
        }
        match serde_json::to_string(message) {
            Ok(json) => {
                if self.cmd_tx.send(Command::Send { kind, json }).is_err() {
                    warn!(kind, "connection closed, dropping outbound message");
                }
            }
            Err(e) => error!(kind, "failed to serialize ClientMessage: {e}"),
        }
    }

    /// Register a callback for every parsed inbound message.
    pub fn subscribe_messages(
        &self,
        callback: impl Fn(&ServerMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.messages.subscribe(callback)
    }

    /// Register a callback for open/close notifications.
    pub fn subscribe_connection(
        &self,
        callback: impl Fn(&ConnectionChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.changes.subscribe(callback)
    }

    pub fn is_open(&self) -> bool {
        self.phase() == ConnectionPhase::Connected
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.shared.phase()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("phase", &self.phase())
            .finish()
    }
}

// ── Connection ──────────────────────────────────────────────────────

/// Owner of the connection task.
///
/// Dropping the `Connection` aborts the task; prefer [`close`](Self::close)
/// for a graceful teardown.
pub struct Connection {
    handle: ConnectionHandle,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl Connection {
    /// Spawn the connection task. Nothing is dialled until
    /// [`connect`](Self::connect) is called.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(connector: impl Connector, policy: ReconnectPolicy) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new());
        let task = tokio::spawn(connection_loop(
            connector,
            cmd_rx,
            Arc::clone(&shared),
            ReconnectController::new(policy),
        ));
        Self {
            handle: ConnectionHandle { cmd_tx, shared },
            task: Some(task),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the time [`close`](Self::close) waits before aborting the task.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// A cloneable handle to this connection.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// See [`ConnectionHandle::connect`].
    ///
    /// # Errors
    ///
    /// The future yields an error if the channel could not be opened.
    pub fn connect(
        &self,
        address: impl Into<String>,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        self.handle.connect(address)
    }

    /// See [`ConnectionHandle::send`].
    pub fn send(&self, message: &ClientMessage) {
        self.handle.send(message);
    }

    /// See [`ConnectionHandle::subscribe_messages`].
    pub fn subscribe_messages(
        &self,
        callback: impl Fn(&ServerMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.handle.subscribe_messages(callback)
    }

    /// See [`ConnectionHandle::subscribe_connection`].
    pub fn subscribe_connection(
        &self,
        callback: impl Fn(&ConnectionChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.handle.subscribe_connection(callback)
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.handle.phase()
    }

    /// Close the channel, cancel any scheduled retry and drop all listeners.
    ///
    /// Listeners are not notified of this close. Calling `close` twice is
    /// harmless.
    pub async fn close(&mut self) {
        debug!("Connection: close requested");

        let Some(mut task) = self.task.take() else {
            return;
        };

        self.handle.shared.messages.clear();
        self.handle.shared.changes.clear();

        let (reply, done) = oneshot::channel();
        if self.handle.cmd_tx.send(Command::Close { reply }).is_ok() {
            match tokio::time::timeout(self.shutdown_timeout, done).await {
                Ok(_) => {}
                Err(_) => warn!("connection task did not close within timeout"),
            }
        }

        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => warn!("connection task terminated with join error: {join_err}"),
            Err(_) => {
                warn!("connection task did not exit within timeout; aborting task");
                task.abort();
            }
        }

        self.handle.shared.set_phase(ConnectionPhase::Disconnected);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("phase", &self.phase())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.handle.shared.messages.clear();
        self.handle.shared.changes.clear();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Connection loop ─────────────────────────────────────────────────

/// State owned by the connection task.
struct LoopState<C> {
    connector: C,
    shared: Arc<Shared>,
    controller: ReconnectController,
    transport: Option<Box<dyn Transport>>,
    retry_at: Option<Instant>,
}

impl<C: Connector> LoopState<C> {
    /// Dial `address`. On failure the close path runs, which may schedule a retry.
    async fn dial(&mut self, address: &str) -> Result<()> {
        self.shared.set_phase(ConnectionPhase::Connecting);
        match self.connector.connect(address).await {
            Ok(transport) => {
                self.transport = Some(transport);
                self.controller.on_open();
                self.shared.set_phase(ConnectionPhase::Connected);
                info!(address, "connected to game server");
                self.shared.changes.notify(&ConnectionChange::Opened);
                Ok(())
            }
            Err(e) => {
                warn!(address, "failed to open connection: {e}");
                self.handle_closed();
                Err(e)
            }
        }
    }

    /// Run once per close event: notify listeners and arm the retry.
    fn handle_closed(&mut self) {
        self.transport = None;
        self.shared.set_phase(ConnectionPhase::Disconnected);
        self.shared.changes.notify(&ConnectionChange::Closed);

        match self.controller.on_closed() {
            ReconnectAction::ScheduleRetry { attempt, delay } => {
                info!(
                    attempt,
                    max = self.controller.policy().max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "scheduling reconnect"
                );
                self.retry_at = Some(Instant::now() + delay);
            }
            ReconnectAction::GiveUp => {
                warn!("reconnect attempts exhausted, giving up");
                self.retry_at = None;
            }
            ReconnectAction::Connect { .. } | ReconnectAction::None => {
                self.retry_at = None;
            }
        }
    }

    async fn teardown(&mut self) {
        if self.controller.teardown() {
            debug!("cancelled pending reconnect");
        }
        self.retry_at = None;
        self.shared.messages.clear();
        self.shared.changes.clear();
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.shared.set_phase(ConnectionPhase::Disconnected);
    }
}

async fn recv_next(transport: &mut Option<Box<dyn Transport>>) -> Option<Result<String>> {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

/// Background task multiplexing commands, inbound frames and the retry timer.
async fn connection_loop<C: Connector>(
    connector: C,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    shared: Arc<Shared>,
    controller: ReconnectController,
) {
    debug!("connection loop started");

    let mut state = LoopState {
        connector,
        shared,
        controller,
        transport: None,
        retry_at: None,
    };

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Connect { address, reply }) => {
                        if state.transport.is_some() {
                            let _ = reply.send(Ok(()));
                            continue;
                        }
                        state.retry_at = None;
                        let result = match state.controller.start(address) {
                            ReconnectAction::Connect { address } => state.dial(&address).await,
                            _ => Err(ClientError::NotConnected),
                        };
                        let _ = reply.send(result);
                    }
                    Some(Command::Send { kind, json }) => {
                        let Some(transport) = state.transport.as_mut() else {
                            warn!(kind, "connection not open, dropping outbound message");
                            continue;
                        };
                        debug!(kind, "sending client message");
                        if let Err(e) = transport.send(json).await {
                            error!(kind, "transport send error: {e}");
                            state.handle_closed();
                        }
                    }
                    Some(Command::Close { reply }) => {
                        state.teardown().await;
                        let _ = reply.send(());
                        break;
                    }
                    // Every handle dropped.
                    None => {
                        state.teardown().await;
                        break;
                    }
                }
            }

            incoming = recv_next(&mut state.transport) => {
                match incoming {
                    Some(Ok(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => {
                            debug!(kind = message.kind(), "received server message");
                            state.shared.messages.notify(&message);
                        }
                        Err(e) => {
                            warn!("failed to deserialize server message: {e}; raw: {text}");
                        }
                    },
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        state.handle_closed();
                    }
                    None => {
                        info!("connection closed by server");
                        state.handle_closed();
                    }
                }
            }

            _ = wait_until(state.retry_at) => {
                state.retry_at = None;
                if let ReconnectAction::Connect { address } = state.controller.on_retry_due() {
                    info!(attempt = state.controller.attempts(), "reconnecting");
                    let _ = state.dial(&address).await;
                }
            }
        }
    }

    debug!("connection loop exited");
}

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
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    // ── Loopback mock ───────────────────────────────────────────────

    struct LoopbackTransport {
        rx: mpsc::UnboundedReceiver<String>,
        tx: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl Transport for LoopbackTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), ClientError> {
            self.tx
                .send(message)
                .map_err(|_| ClientError::TransportSend("server gone".into()))
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ClientError>> {
            self.rx.recv().await.map(Ok)
        }

        async fn close(&mut self) -> std::result::Result<(), ClientError> {
            Ok(())
        }
    }

    /// The server's end of one accepted connection.
    struct ServerEnd {
        to_client: mpsc::UnboundedSender<String>,
        from_client: mpsc::UnboundedReceiver<String>,
    }

    struct MockConnector {
        refuse: Arc<AtomicBool>,
        dials: Arc<AtomicUsize>,
        accepted: mpsc::UnboundedSender<ServerEnd>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(
            &self,
            _address: &str,
        ) -> std::result::Result<Box<dyn Transport>, ClientError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(ClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )));
            }
            let (to_client, rx) = mpsc::unbounded_channel();
            let (tx, from_client) = mpsc::unbounded_channel();
            let _ = self.accepted.send(ServerEnd {
                to_client,
                from_client,
            });
            Ok(Box::new(LoopbackTransport { rx, tx }))
        }
    }

    struct Harness {
        connection: Connection,
        refuse: Arc<AtomicBool>,
        dials: Arc<AtomicUsize>,
        accepted: mpsc::UnboundedReceiver<ServerEnd>,
        changes: mpsc::UnboundedReceiver<ConnectionChange>,
        messages: mpsc::UnboundedReceiver<ServerMessage>,
        _subs: Vec<Subscription>,
    }

    fn harness(max_attempts: u32) -> Harness {
        let refuse = Arc::new(AtomicBool::new(false));
        let dials = Arc::new(AtomicUsize::new(0));
        let (accepted_tx, accepted) = mpsc::unbounded_channel();
        let connector = MockConnector {
            refuse: Arc::clone(&refuse),
            dials: Arc::clone(&dials),
            accepted: accepted_tx,
        };
        let connection = Connection::new(
            connector,
            ReconnectPolicy::new(max_attempts, Duration::from_millis(2000)),
        );

        let (change_tx, changes) = mpsc::unbounded_channel();
        let (message_tx, messages) = mpsc::unbounded_channel();
        let subs = vec![
            connection.subscribe_connection(move |change| {
                let _ = change_tx.send(*change);
            }),
            connection.subscribe_messages(move |message| {
                let _ = message_tx.send(message.clone());
            }),
        ];

        Harness {
            connection,
            refuse,
            dials,
            accepted,
            changes,
            messages,
            _subs: subs,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connect_opens_and_notifies() {
        let mut h = harness(3);
        assert_eq!(h.connection.phase(), ConnectionPhase::Disconnected);

        h.connection.connect("ws://test").await.unwrap();

        assert!(h.connection.is_open());
        assert_eq!(h.changes.recv().await, Some(ConnectionChange::Opened));
        assert!(h.accepted.recv().await.is_some());
        h.connection.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_messages_arrive_in_order_and_garbage_is_dropped() {
        let mut h = harness(3);
        h.connection.connect("ws://test").await.unwrap();
        let server = h.accepted.recv().await.unwrap();

        server
            .to_client
            .send(r#"{"type":"waiting","timeLeft":10}"#.into())
            .unwrap();
        server.to_client.send("{not json".into()).unwrap();
        server
            .to_client
            .send(r#"{"type":"opponentDisconnected"}"#.into())
            .unwrap();

        assert_eq!(
            h.messages.recv().await,
            Some(ServerMessage::Waiting { time_left: 10 })
        );
        assert_eq!(
            h.messages.recv().await,
            Some(ServerMessage::OpponentDisconnected)
        );
        assert!(h.connection.is_open());
        h.connection.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn send_reaches_server_only_while_open() {
        let mut h = harness(3);

        // Not open yet: logged and dropped.
        h.connection.send(&ClientMessage::GetLeaderboard);

        h.connection.connect("ws://test").await.unwrap();
        let mut server = h.accepted.recv().await.unwrap();
        h.connection.send(&ClientMessage::Join {
            username: "alice".into(),
        });

        let raw = server.from_client.recv().await.unwrap();
        let sent: ClientMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            sent,
            ClientMessage::Join {
                username: "alice".into()
            }
        );
        assert!(server.from_client.try_recv().is_err());
        h.connection.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn server_close_notifies_once_and_redials_after_base_delay() {
        let mut h = harness(3);
        h.connection.connect("ws://test").await.unwrap();
        assert_eq!(h.changes.recv().await, Some(ConnectionChange::Opened));
        let server = h.accepted.recv().await.unwrap();

        let closed_at = Instant::now();
        drop(server);

        assert_eq!(h.changes.recv().await, Some(ConnectionChange::Closed));
        assert!(!h.connection.is_open());

        // The redial comes after exactly one base delay.
        let _second = h.accepted.recv().await.unwrap();
        let waited = Instant::now() - closed_at;
        assert!(waited >= Duration::from_millis(2000), "redialled after {waited:?}");
        assert!(waited < Duration::from_millis(2100), "redialled after {waited:?}");
        assert_eq!(h.changes.recv().await, Some(ConnectionChange::Opened));
        assert_eq!(h.dials.load(Ordering::SeqCst), 2);
        assert!(h.changes.try_recv().is_err());
        h.connection.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_open_retries_until_exhausted() {
        let mut h = harness(3);
        h.refuse.store(true, Ordering::SeqCst);

        let result = h.connection.connect("ws://test").await;
        assert!(matches!(result, Err(ClientError::Io(_))));

        // 2s + 4s + 6s of linear backoff, then silence.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.dials.load(Ordering::SeqCst), 4);

        let mut closes = 0;
        while let Ok(change) = h.changes.try_recv() {
            assert_eq!(change, ConnectionChange::Closed);
            closes += 1;
        }
        assert_eq!(closes, 4);
        assert_eq!(h.connection.phase(), ConnectionPhase::Disconnected);
        h.connection.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_retry_and_clears_listeners() {
        let mut h = harness(3);
        h.connection.connect("ws://test").await.unwrap();
        let server = h.accepted.recv().await.unwrap();
        h.refuse.store(true, Ordering::SeqCst);
        drop(server);
        assert_eq!(h.changes.recv().await, Some(ConnectionChange::Opened));
        assert_eq!(h.changes.recv().await, Some(ConnectionChange::Closed));

        h.connection.close().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(h.dials.load(Ordering::SeqCst), 1);
        // The subscription callbacks were dropped, closing the channels.
        assert_eq!(h.changes.recv().await, None);
        assert_eq!(h.connection.phase(), ConnectionPhase::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_after_close_fails() {
        let mut h = harness(3);
        h.connection.close().await;
        h.connection.close().await;
        let result = h.connection.handle().connect("ws://test").await;
        assert!(matches!(result, Err(ClientError::TransportClosed)));
    }
}
