//! Background half of a connection: connect, receive loop and writer.
//!
//! A [`Session`] is started per accepted `connect`. Everything it learns is
//! reported to the consumer as [`SessionEvent`]s on a single channel, so
//! status changes and decoded messages keep their relative order. The
//! consumer side only ever calls non-blocking methods.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::codec::{AnyMessage, MessageRegistry};
use crate::error::Result;
use crate::protocol::{ByteBuffer, Frame, FrameBuffer};
use crate::writer::{outbound_channel, writer_loop, OutboundQueue, WriterExit, WriterHandle};

/// Something the background tasks report to the consumer.
pub enum SessionEvent {
    /// The socket connected.
    Connected,
    /// The socket could not be connected.
    ConnectFailed(String),
    /// A decoded inbound message.
    Message {
        /// Wire id of the message.
        id: u16,
        /// The decoded message.
        message: AnyMessage,
    },
    /// The peer closed its side (zero-byte read).
    PeerClosed,
    /// A socket or protocol error ended the session.
    Failed(String),
    /// A requested close finished draining and the socket is shut down.
    Closed,
}

impl std::fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::Connected => f.write_str("Connected"),
            SessionEvent::ConnectFailed(detail) => {
                f.debug_tuple("ConnectFailed").field(detail).finish()
            }
            SessionEvent::Message { id, .. } => f.debug_struct("Message").field("id", id).finish(),
            SessionEvent::PeerClosed => f.write_str("PeerClosed"),
            SessionEvent::Failed(detail) => f.debug_tuple("Failed").field(detail).finish(),
            SessionEvent::Closed => f.write_str("Closed"),
        }
    }
}

/// Sending side of the event channel, shared by the session tasks.
#[derive(Clone)]
struct EventSender {
    tx: mpsc::UnboundedSender<SessionEvent>,
    inbound: Arc<AtomicUsize>,
}

impl EventSender {
    fn status(&self, event: SessionEvent) {
        // Receiver gone means the consumer already tore the session down
        let _ = self.tx.send(event);
    }

    fn message(&self, id: u16, message: AnyMessage) {
        self.inbound.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(SessionEvent::Message { id, message }).is_err() {
            self.inbound.fetch_sub(1, Ordering::Release);
        }
    }
}

/// Consumer side of the event channel.
pub struct SessionEvents {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    inbound: Arc<AtomicUsize>,
    held: Option<SessionEvent>,
}

impl SessionEvents {
    fn new(rx: mpsc::UnboundedReceiver<SessionEvent>, inbound: Arc<AtomicUsize>) -> Self {
        Self {
            rx,
            inbound,
            held: None,
        }
    }

    /// Take the next event without waiting.
    pub fn try_next(&mut self) -> Option<SessionEvent> {
        self.next_if(|_| true)
    }

    /// Take the next event only if `accept` approves it.
    ///
    /// A rejected event stays at the head of the queue.
    pub fn next_if(&mut self, accept: impl FnOnce(&SessionEvent) -> bool) -> Option<SessionEvent> {
        if self.held.is_none() {
            self.held = self.rx.try_recv().ok();
        }
        if !accept(self.held.as_ref()?) {
            return None;
        }

        let event = self.held.take()?;
        if matches!(event, SessionEvent::Message { .. }) {
            self.inbound.fetch_sub(1, Ordering::AcqRel);
        }
        Some(event)
    }

    /// Decoded messages waiting to be dispatched.
    #[inline]
    pub fn pending_messages(&self) -> usize {
        self.inbound.load(Ordering::Acquire)
    }
}

/// Settings a session needs from the connector.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host name or address.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// Initial receive buffer capacity.
    pub initial_buffer_size: usize,
}

/// Consumer-side handle to a running session.
///
/// Dropping it aborts the session.
pub struct Session {
    writer: WriterHandle,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Session {
    /// Spawn the connect task on `runtime`.
    pub fn start(
        runtime: &Handle,
        config: SessionConfig,
        registry: Arc<MessageRegistry>,
    ) -> (Session, SessionEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inbound = Arc::new(AtomicUsize::new(0));
        let events = EventSender {
            tx,
            inbound: inbound.clone(),
        };

        let (writer, queue) = outbound_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown = Arc::new(shutdown_tx);

        runtime.spawn(run_session(
            config,
            registry,
            queue,
            events,
            shutdown.clone(),
            shutdown_rx,
        ));

        (Session { writer, shutdown }, SessionEvents::new(rx, inbound))
    }

    /// Queue an encoded frame.
    pub fn send(&self, frame: ByteBuffer) -> Result<()> {
        self.writer.send(frame)
    }

    /// Close once every queued frame has been written.
    pub fn close(&self) -> Result<()> {
        self.writer.close()
    }

    /// Stop all session tasks now, discarding queued frames.
    pub fn abort(&self) {
        self.shutdown.send_replace(true);
    }

    /// Frames queued but not yet fully written.
    #[inline]
    pub fn pending_sends(&self) -> usize {
        self.writer.pending_count()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn run_session(
    config: SessionConfig,
    registry: Arc<MessageRegistry>,
    queue: OutboundQueue,
    events: EventSender,
    shutdown: Arc<watch::Sender<bool>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let connect = TcpStream::connect((config.host.as_str(), config.port));
    let stream = tokio::select! {
        biased;
        _ = shutdown_rx.changed() => return,
        result = connect => result,
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            warn!(host = %config.host, port = config.port, detail = %e, "connect failed");
            events.status(SessionEvent::ConnectFailed(e.to_string()));
            return;
        }
    };

    if let Err(e) = stream.set_nodelay(true) {
        warn!(detail = %e, "failed to set TCP_NODELAY");
    }

    info!(host = %config.host, port = config.port, "connected");
    events.status(SessionEvent::Connected);

    let (read_half, write_half) = stream.into_split();

    tokio::spawn(read_loop(
        read_half,
        registry,
        FrameBuffer::with_capacity(config.initial_buffer_size),
        events.clone(),
        shutdown_rx.clone(),
    ));

    match writer_loop(queue, write_half, shutdown_rx).await {
        Ok(WriterExit::Closed) => {
            debug!("writer drained, socket shut down");
            events.status(SessionEvent::Closed);
        }
        Ok(WriterExit::Aborted) | Ok(WriterExit::Dropped) => {
            debug!("writer stopped");
        }
        Err(e) => {
            error!(detail = %e, "write failed");
            events.status(SessionEvent::Failed(e.to_string()));
        }
    }

    // Writer is done either way; the receive loop goes with it
    shutdown.send_replace(true);
}

/// Receive loop: read into the frame buffer, drain frames, decode, report.
async fn read_loop<R>(
    mut reader: R,
    registry: Arc<MessageRegistry>,
    mut frames: FrameBuffer,
    events: EventSender,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        if *shutdown.borrow() {
            return;
        }

        frames.reserve_headroom();

        let read = tokio::select! {
            biased;
            _ = shutdown.changed() => return,
            read = reader.read(frames.recv_slice()) => read,
        };

        match read {
            Ok(0) => {
                debug!("peer closed connection");
                events.status(SessionEvent::PeerClosed);
                return;
            }
            Ok(n) => frames.recv_advance(n),
            Err(e) => {
                error!(detail = %e, "read failed");
                events.status(SessionEvent::Failed(e.to_string()));
                return;
            }
        }

        loop {
            match frames.next_frame() {
                Ok(Some(frame)) => dispatch_frame(&frame, &registry, &events),
                Ok(None) => break,
                Err(e) => {
                    error!(detail = %e, "malformed frame, dropping connection");
                    events.status(SessionEvent::Failed(e.to_string()));
                    return;
                }
            }
        }
    }
}

/// Decode a single frame and queue it for the consumer.
///
/// Unknown ids and undecodable bodies drop just this frame.
fn dispatch_frame(frame: &Frame, registry: &MessageRegistry, events: &EventSender) {
    let id = frame.message_id();

    match registry.decode(id, frame.body()) {
        Ok(message) => {
            debug!(message_id = id, len = frame.body_len(), "received message");
            events.message(id, message);
        }
        Err(e) => {
            warn!(message_id = id, detail = %e, "dropping frame");
        }
    }
}
