//! Dedicated writer task for the outbound frame queue.
//!
//! The consumer thread never touches the socket. Each `send` encodes a frame
//! into a [`ByteBuffer`] and hands it over an unbounded channel; the writer
//! task owns the queue from then on and transmits strictly in order.
//!
//! # Architecture
//!
//! ```text
//! send() ─┐
//! ping  ──┼─► mpsc::UnboundedSender<Outbound> ─► Writer Task ─► TcpStream
//! close ──┘
//! ```
//!
//! Ready frames are batched into a single vectored write. After each write
//! the read cursors of the queued buffers advance by the bytes the kernel
//! actually accepted, so a partial write resumes mid-frame. A `Close`
//! request is queued behind the frames before it and only shuts the socket
//! down once they have drained.

use std::collections::VecDeque;
use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

use crate::error::{Result, TickwireError};
use crate::protocol::ByteBuffer;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// An item on the outbound queue.
#[derive(Debug)]
pub enum Outbound {
    /// A complete frame.
    Frame(ByteBuffer),
    /// Shut the socket down once everything queued before has been written.
    Close,
}

/// How the writer loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// A queued `Close` was reached and the socket shut down.
    Closed,
    /// The session was aborted; queued frames were discarded.
    Aborted,
    /// Every handle was dropped.
    Dropped,
}

/// Handle for queueing frames on the writer task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<Outbound>,
    pending: Arc<AtomicUsize>,
}

/// Receiving side of the outbound queue, consumed by [`writer_loop`].
pub struct OutboundQueue {
    rx: mpsc::UnboundedReceiver<Outbound>,
    pending: Arc<AtomicUsize>,
}

/// Create a connected handle/queue pair.
///
/// The handle is usable immediately; frames queue up until the writer task
/// starts draining.
pub fn outbound_channel() -> (WriterHandle, OutboundQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));

    (
        WriterHandle {
            tx,
            pending: pending.clone(),
        },
        OutboundQueue { rx, pending },
    )
}

impl WriterHandle {
    /// Queue a frame.
    pub fn send(&self, frame: ByteBuffer) -> Result<()> {
        // Count before sending so the writer can never decrement first
        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.send(Outbound::Frame(frame)).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            TickwireError::ConnectionClosed
        })
    }

    /// Queue a close behind every frame sent so far.
    pub fn close(&self) -> Result<()> {
        self.tx
            .send(Outbound::Close)
            .map_err(|_| TickwireError::ConnectionClosed)
    }

    /// Frames queued but not yet fully written.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Main writer loop: drain the queue onto `writer` until closed or aborted.
///
/// An abort (the shutdown signal turning `true`) discards whatever is still
/// queued, including a batch whose write is in progress.
pub async fn writer_loop<W>(
    queue: OutboundQueue,
    mut writer: W,
    mut shutdown: watch::Receiver<bool>,
) -> Result<WriterExit>
where
    W: AsyncWrite + Unpin,
{
    let OutboundQueue { mut rx, pending } = queue;

    loop {
        if *shutdown.borrow() {
            return Ok(WriterExit::Aborted);
        }

        // Wait for first item
        let first = tokio::select! {
            biased;
            _ = shutdown.changed() => return Ok(WriterExit::Aborted),
            item = rx.recv() => match item {
                Some(item) => item,
                None => return Ok(WriterExit::Dropped),
            },
        };

        let mut batch = VecDeque::with_capacity(MAX_BATCH_SIZE);
        let mut close = false;
        match first {
            Outbound::Frame(frame) => batch.push_back(frame),
            Outbound::Close => close = true,
        }

        // Collect additional ready frames (non-blocking)
        while !close && batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(Outbound::Frame(frame)) => batch.push_back(frame),
                Ok(Outbound::Close) => close = true,
                Err(_) => break,
            }
        }

        // A dead peer can park the write forever; an abort must still win
        tokio::select! {
            biased;
            _ = shutdown.changed() => return Ok(WriterExit::Aborted),
            result = write_batch(&mut writer, &mut batch, &pending) => result?,
        }

        if close {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return Ok(WriterExit::Aborted),
                result = writer.shutdown() => result?,
            }
            return Ok(WriterExit::Closed);
        }
    }
}

/// Write a batch of frames using scatter/gather I/O (write_vectored).
///
/// Frames are dequeued, and the pending count decremented, as each one is
/// fully written.
async fn write_batch<W>(
    writer: &mut W,
    batch: &mut VecDeque<ByteBuffer>,
    pending: &AtomicUsize,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    while !batch.is_empty() {
        let written = {
            let slices: Vec<IoSlice<'_>> =
                batch.iter().map(|frame| IoSlice::new(frame.readable())).collect();
            writer.write_vectored(&slices).await?
        };

        if written == 0 {
            return Err(TickwireError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }

        consume_written(batch, written, pending);
    }

    writer.flush().await?;
    Ok(())
}

/// Advance read cursors by `written` bytes, front to back, popping every
/// frame that is fully drained.
fn consume_written(batch: &mut VecDeque<ByteBuffer>, mut written: usize, pending: &AtomicUsize) {
    while let Some(head) = batch.front_mut() {
        let step = written.min(head.len());
        head.advance_read(step);
        written -= step;

        if !head.is_empty() {
            break;
        }
        batch.pop_front();
        pending.fetch_sub(1, Ordering::Release);

        if written == 0 {
            break;
        }
    }
}
