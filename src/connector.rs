//! Connector builder and the consumer-facing connection manager.
//!
//! The [`ConnectorBuilder`] provides a fluent API for configuring the
//! connection and registering message types. The [`Connector`] manages the
//! lifecycle from the consumer thread:
//! 1. `connect` spawns a session on the runtime and returns immediately
//! 2. `send` queues encoded frames for the writer task
//! 3. `poll_once` applies status changes, dispatches a bounded number of
//!    inbound messages and runs the heartbeat
//! 4. `close` shuts the socket down once queued frames have drained
//!
//! None of these block. Handlers run synchronously inside `poll_once`.
//!
//! # Example
//!
//! ```ignore
//! use tickwire::{ConnectStatus, Connector};
//!
//! let mut connector = Connector::builder()
//!     .register::<Move>(1)
//!     .max_messages_per_poll(32)
//!     .build()?;
//!
//! connector.on_status(ConnectStatus::Succeeded, |_| println!("connected"));
//! connector.on_message(|m: &Move| println!("{:?}", m))?;
//! connector.connect("127.0.0.1", 7777)?;
//!
//! loop {
//!     connector.poll_once();
//!     // ... rest of the frame
//! }
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info, warn};

use crate::codec::{Message, MessageRegistry, Ping};
use crate::config::{ConnectorConfig, HeartbeatConfig};
use crate::error::{Result, TickwireError};
use crate::handler::{ConnectStatus, HandlerId, HandlerRegistry, StatusEvent};
use crate::heartbeat::{Heartbeat, HeartbeatAction};
use crate::session::{Session, SessionConfig, SessionEvent, SessionEvents};

/// Lifecycle state of a [`Connector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected, or the last connect attempt failed.
    Idle,
    /// Connect in flight.
    Connecting,
    /// Connected; sends are accepted.
    Connected,
    /// Close requested, waiting for queued sends to drain.
    Closing,
    /// Connection closed.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Builder for configuring and creating a [`Connector`].
///
/// Registration errors are held until `build`, so the chain stays fluent.
pub struct ConnectorBuilder {
    config: ConnectorConfig,
    registry: MessageRegistry,
    error: Option<TickwireError>,
}

impl ConnectorBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ConnectorConfig::default(),
            registry: MessageRegistry::new(),
            error: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ConnectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the heartbeat settings.
    pub fn heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.config.heartbeat = heartbeat;
        self
    }

    /// Set the interval between pings.
    ///
    /// Default: 3 seconds
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat.interval = interval;
        self
    }

    /// Set the inbound silence after which the connection is force-closed.
    ///
    /// Default: 120 seconds
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.config.heartbeat.timeout = timeout;
        self
    }

    /// Turn pings and the liveness timeout off.
    pub fn disable_heartbeat(mut self) -> Self {
        self.config.heartbeat.enabled = false;
        self
    }

    /// Set the initial receive buffer capacity.
    ///
    /// Default: 1024 bytes
    pub fn initial_buffer_size(mut self, size: usize) -> Self {
        self.config.initial_buffer_size = size;
        self
    }

    /// Set how many messages one poll dispatches at most.
    ///
    /// Default: 10
    pub fn max_messages_per_poll(mut self, limit: usize) -> Self {
        self.config.max_messages_per_poll = limit;
        self
    }

    /// Register a message type under a wire id.
    pub fn register<M: Message>(mut self, id: u16) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.registry.register::<M>(id) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Build a connector that runs its I/O on its own multi-thread runtime.
    ///
    /// Must not be called, or the connector dropped, from inside an async
    /// context; use [`build_with_handle`](Self::build_with_handle) there.
    pub fn build(self) -> Result<Connector> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("tickwire-io")
            .enable_all()
            .build()?;
        self.finish(RuntimeHandle::Owned(runtime))
    }

    /// Build a connector that spawns its I/O onto an existing runtime.
    pub fn build_with_handle(self, handle: Handle) -> Result<Connector> {
        self.finish(RuntimeHandle::Borrowed(handle))
    }

    fn finish(self, runtime: RuntimeHandle) -> Result<Connector> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(Connector::new(self.config, self.registry, runtime))
    }
}

impl Default for ConnectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

enum RuntimeHandle {
    Owned(Runtime),
    Borrowed(Handle),
}

impl RuntimeHandle {
    fn handle(&self) -> &Handle {
        match self {
            RuntimeHandle::Owned(runtime) => runtime.handle(),
            RuntimeHandle::Borrowed(handle) => handle,
        }
    }
}

/// A poll-driven client connection.
///
/// Owned by a single consumer thread. All methods return immediately; the
/// socket is serviced by tasks on the runtime and everything they observe
/// is applied in [`poll_once`](Self::poll_once).
pub struct Connector {
    config: ConnectorConfig,
    registry: Arc<MessageRegistry>,
    state: ConnectionState,
    session: Option<Session>,
    /// Kept past a close so already received messages still dispatch.
    events: Option<SessionEvents>,
    handlers: HandlerRegistry,
    heartbeat: Heartbeat,
    // Last, so sessions are torn down before an owned runtime
    runtime: RuntimeHandle,
}

impl Connector {
    /// Create a new connector builder.
    pub fn builder() -> ConnectorBuilder {
        ConnectorBuilder::new()
    }

    fn new(config: ConnectorConfig, registry: MessageRegistry, runtime: RuntimeHandle) -> Self {
        Self {
            heartbeat: Heartbeat::new(config.heartbeat.clone(), Instant::now()),
            config,
            registry: Arc::new(registry),
            state: ConnectionState::Idle,
            session: None,
            events: None,
            handlers: HandlerRegistry::new(),
            runtime,
        }
    }

    /// Start connecting to `host:port`.
    ///
    /// Returns once the attempt is spawned. The outcome arrives as a
    /// `Succeeded` or `Failed` status event during a later poll.
    ///
    /// # Errors
    ///
    /// Rejected while connecting, connected or closing.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        match self.state {
            ConnectionState::Connecting => {
                return reject("connect", TickwireError::AlreadyConnecting)
            }
            ConnectionState::Connected => {
                return reject("connect", TickwireError::AlreadyConnected)
            }
            ConnectionState::Closing => return reject("connect", TickwireError::Closing),
            ConnectionState::Idle | ConnectionState::Closed => {}
        }

        let config = SessionConfig {
            host: host.to_string(),
            port,
            initial_buffer_size: self.config.initial_buffer_size,
        };
        let (session, events) =
            Session::start(self.runtime.handle(), config, self.registry.clone());

        let discarded = self.pending_messages();
        if discarded > 0 {
            warn!(discarded, "discarding undispatched messages from the previous connection");
        }

        self.session = Some(session);
        self.events = Some(events);
        self.state = ConnectionState::Connecting;

        info!(host, port, "connecting");
        Ok(())
    }

    /// Close the connection.
    ///
    /// With nothing queued the socket closes now and `Closed` handlers run
    /// before this returns. Otherwise the state becomes `Closing` and the
    /// socket closes after the last queued byte is written; `Closed`
    /// handlers then run during a later poll.
    ///
    /// # Errors
    ///
    /// Rejected unless connected.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Connected => {}
            ConnectionState::Connecting => {
                return reject("close", TickwireError::AlreadyConnecting)
            }
            ConnectionState::Closing => return reject("close", TickwireError::Closing),
            ConnectionState::Idle | ConnectionState::Closed => {
                return reject("close", TickwireError::NotConnected)
            }
        }

        self.close_connected();
        Ok(())
    }

    /// Close from `Connected`: defer behind queued sends, or tear down now.
    fn close_connected(&mut self) {
        let deferred = match &self.session {
            Some(session) if session.pending_sends() > 0 => session.close().is_ok(),
            _ => false,
        };

        if deferred {
            info!(pending = self.pending_sends(), "closing after queued sends drain");
            self.state = ConnectionState::Closing;
        } else {
            info!("closed");
            self.teardown(ConnectionState::Closed, StatusEvent::Closed);
        }
    }

    /// Encode and queue a message.
    ///
    /// Frames reach the wire in call order.
    ///
    /// # Errors
    ///
    /// Rejected unless connected. Also fails if the type is not registered
    /// or the frame would exceed the 16-bit length field.
    pub fn send<M: Message>(&mut self, message: &M) -> Result<()> {
        let session = match (self.state, &self.session) {
            (ConnectionState::Connected, Some(session)) => session,
            (ConnectionState::Closing, _) => return reject("send", TickwireError::Closing),
            _ => return reject("send", TickwireError::NotConnected),
        };

        let frame = match self.registry.encode_frame(message) {
            Ok(frame) => frame,
            Err(e) => return reject("send", e),
        };

        debug!(message_type = type_name::<M>(), len = frame.len(), "queueing message");
        session.send(frame)
    }

    /// Poll with the current time. See [`poll_at`](Self::poll_at).
    pub fn poll_once(&mut self) -> usize {
        self.poll_at(Instant::now())
    }

    /// Apply pending status changes, dispatch up to
    /// `max_messages_per_poll` messages, then run the heartbeat with `now`
    /// as the current time.
    ///
    /// Returns the number of messages dispatched. Messages beyond the bound
    /// stay queued for the next poll, and so does everything behind them.
    /// Status changes ahead of the first held message are always applied,
    /// even with a bound of zero.
    pub fn poll_at(&mut self, now: Instant) -> usize {
        let mut dispatched = 0;

        loop {
            let bound_reached = dispatched >= self.config.max_messages_per_poll;
            let Some(event) = self.events.as_mut().and_then(|events| {
                events.next_if(|e| !bound_reached || !matches!(e, SessionEvent::Message { .. }))
            }) else {
                break;
            };

            match event {
                SessionEvent::Message { id, message } => {
                    self.heartbeat.record_inbound(now);
                    self.handlers.dispatch_message(id, &*message);
                    dispatched += 1;
                }
                SessionEvent::Connected => self.on_connected(now),
                SessionEvent::ConnectFailed(detail) => self.on_connect_failed(detail),
                SessionEvent::PeerClosed => self.on_peer_closed(),
                SessionEvent::Failed(detail) => self.on_failed(detail),
                SessionEvent::Closed => self.on_closed(),
            }
        }

        if self.state == ConnectionState::Connected {
            self.check_liveness(now);
        }

        dispatched
    }

    fn on_connected(&mut self, now: Instant) {
        if self.state != ConnectionState::Connecting {
            return;
        }
        self.state = ConnectionState::Connected;
        self.heartbeat.reset(now);
        self.handlers.notify(&StatusEvent::Succeeded);
    }

    fn on_connect_failed(&mut self, detail: String) {
        if self.state != ConnectionState::Connecting {
            return;
        }
        self.teardown(ConnectionState::Idle, StatusEvent::Failed(detail));
    }

    fn on_peer_closed(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        info!("peer closed the connection");
        self.close_connected();
    }

    fn on_failed(&mut self, detail: String) {
        if !matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Closing
        ) {
            return;
        }
        warn!(detail = %detail, "connection failed");
        self.teardown(ConnectionState::Closed, StatusEvent::Failed(detail));
    }

    fn on_closed(&mut self) {
        if self.state != ConnectionState::Closing {
            return;
        }
        info!("closed");
        self.teardown(ConnectionState::Closed, StatusEvent::Closed);
    }

    fn check_liveness(&mut self, now: Instant) {
        match self.heartbeat.check(now) {
            HeartbeatAction::Idle => {}
            HeartbeatAction::SendPing => {
                if let Err(e) = self.send(&Ping {}) {
                    warn!(detail = %e, "failed to queue ping");
                }
            }
            HeartbeatAction::TimedOut => {
                warn!(
                    timeout = ?self.config.heartbeat.timeout,
                    "no inbound traffic, forcing close"
                );
                self.teardown(ConnectionState::Closed, StatusEvent::Closed);
            }
        }
    }

    /// Abort the session, discarding queued sends, and report `event`.
    fn teardown(&mut self, state: ConnectionState, event: StatusEvent) {
        if let Some(session) = self.session.take() {
            session.abort();
        }
        self.state = state;
        self.handlers.notify(&event);
    }

    /// Register a status handler.
    pub fn on_status<F>(&mut self, status: ConnectStatus, handler: F) -> HandlerId
    where
        F: FnMut(&StatusEvent) + Send + 'static,
    {
        self.handlers.add_status_handler(status, handler)
    }

    /// Remove a status handler. Returns false if it was not registered.
    pub fn off_status(&mut self, id: HandlerId) -> bool {
        self.handlers.remove_status_handler(id)
    }

    /// Register a handler for messages of type `M`.
    ///
    /// # Errors
    ///
    /// `UnregisteredMessage` if `M` has no wire id.
    pub fn on_message<M, F>(&mut self, handler: F) -> Result<HandlerId>
    where
        M: Message,
        F: FnMut(&M) + Send + 'static,
    {
        let id = self
            .registry
            .id_of::<M>()
            .ok_or(TickwireError::UnregisteredMessage(type_name::<M>()))?;
        Ok(self.handlers.add_message_handler(id, handler))
    }

    /// Remove a message handler. Returns false if it was not registered.
    pub fn off_message(&mut self, id: HandlerId) -> bool {
        self.handlers.remove_message_handler(id)
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Frames queued but not yet fully written.
    pub fn pending_sends(&self) -> usize {
        self.session.as_ref().map_or(0, Session::pending_sends)
    }

    /// Received messages waiting for a poll.
    pub fn pending_messages(&self) -> usize {
        self.events.as_ref().map_or(0, SessionEvents::pending_messages)
    }

    /// The configuration this connector was built with.
    #[inline]
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// The message registry.
    #[inline]
    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }
}

fn reject(operation: &'static str, error: TickwireError) -> Result<()> {
    warn!(operation, reason = %error, "operation rejected");
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    struct Move {
        x: f32,
        y: f32,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    struct Chat {
        text: String,
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Connector::builder()
            .heartbeat_interval(Duration::from_millis(250))
            .heartbeat_timeout(Duration::from_secs(5))
            .initial_buffer_size(64)
            .max_messages_per_poll(3);

        assert_eq!(builder.config.heartbeat.interval, Duration::from_millis(250));
        assert_eq!(builder.config.heartbeat.timeout, Duration::from_secs(5));
        assert_eq!(builder.config.initial_buffer_size, 64);
        assert_eq!(builder.config.max_messages_per_poll, 3);
        assert!(builder.config.heartbeat.enabled);

        let builder = builder.disable_heartbeat();
        assert!(!builder.config.heartbeat.enabled);
    }

    #[test]
    fn test_builder_reports_first_registration_error() {
        let result = Connector::builder()
            .register::<Move>(1)
            .register::<Chat>(1)
            .register::<Chat>(0xFFFF)
            .build();

        assert!(matches!(result, Err(TickwireError::DuplicateMessageId(1))));
    }

    #[test]
    fn test_build_with_owned_runtime() {
        let connector = Connector::builder().register::<Move>(1).build().unwrap();

        assert_eq!(connector.state(), ConnectionState::Idle);
        assert_eq!(connector.registry().id_of::<Move>(), Some(1));
        assert_eq!(connector.pending_sends(), 0);
        assert_eq!(connector.pending_messages(), 0);
    }

    #[test]
    fn test_rejections_when_idle() {
        let mut connector = Connector::builder().register::<Move>(1).build().unwrap();

        assert!(matches!(
            connector.send(&Move { x: 0.0, y: 0.0 }),
            Err(TickwireError::NotConnected)
        ));
        assert!(matches!(connector.close(), Err(TickwireError::NotConnected)));
        assert_eq!(connector.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_on_message_requires_registration() {
        let mut connector = Connector::builder().register::<Move>(1).build().unwrap();

        assert!(connector.on_message(|_: &Move| {}).is_ok());
        assert!(matches!(
            connector.on_message(|_: &Chat| {}),
            Err(TickwireError::UnregisteredMessage(_))
        ));
    }

    #[test]
    fn test_handler_registration_round_trip() {
        let mut connector = Connector::builder().register::<Move>(1).build().unwrap();

        let status = connector.on_status(ConnectStatus::Closed, |_| {});
        let message = connector.on_message(|_: &Move| {}).unwrap();

        assert!(connector.off_status(status));
        assert!(!connector.off_status(status));
        assert!(connector.off_message(message));
        assert!(!connector.off_message(message));
    }

    #[test]
    fn test_poll_without_connection() {
        let mut connector = Connector::builder().build().unwrap();
        assert_eq!(connector.poll_once(), 0);
        assert_eq!(connector.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_connect_rejected_while_connecting() {
        let mut connector = Connector::builder().build().unwrap();

        connector.connect("127.0.0.1", 9).unwrap();
        assert_eq!(connector.state(), ConnectionState::Connecting);

        assert!(matches!(
            connector.connect("127.0.0.1", 9),
            Err(TickwireError::AlreadyConnecting)
        ));
        assert!(matches!(connector.close(), Err(TickwireError::AlreadyConnecting)));
        assert!(matches!(
            connector.send(&Ping {}),
            Err(TickwireError::NotConnected)
        ));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Closing.to_string(), "closing");
        assert_eq!(ConnectionState::Idle.to_string(), "idle");
    }
}
