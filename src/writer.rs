//! Send loop: drains the outbound queue onto the socket.
//!
//! # Architecture
//!
//! ```text
//! Caller 1 ─┐
//! Caller 2 ─┼─► mpsc::Sender<ByteSeq> ─► Send loop ─► socket write half
//! Caller N ─┘
//! ```
//!
//! Items are written one at a time. A single-segment payload goes out with a
//! plain write; a multi-segment payload is laid out in a reused
//! [`ScatterList`] and written with `write_vectored`, continuing from the
//! exact byte a short write stopped at.

use std::io::{self, IoSlice};
use std::sync::Arc;

use bytes::{Buf, Bytes};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

use crate::buffer::ByteSeq;
use crate::channel::{signalled, ChannelInner, CloseReason};

/// Maximum segments handed to one vectored write.
const MAX_IOVECS: usize = 64;

/// Reusable list of views over an outbound payload's segments.
///
/// Holds `Bytes` handles (pointer + length into the caller's storage), never
/// copies of the bytes. The vector's allocation is kept between sends.
#[derive(Debug, Default)]
pub(crate) struct ScatterList {
    segments: Vec<Bytes>,
    /// First segment not fully written.
    index: usize,
    /// Bytes left to write.
    remaining: usize,
}

impl ScatterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with `payload`'s segments.
    pub fn load(&mut self, payload: ByteSeq) {
        self.segments.clear();
        self.remaining = payload.len();
        self.segments.extend(payload.into_segments());
        self.index = 0;
    }

    /// Drop segment handles, keeping the allocation.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.index = 0;
        self.remaining = 0;
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.segments.capacity()
    }

    /// Fill `dst` with slices of the unwritten segments; returns the count.
    pub fn fill_slices<'a>(&'a self, dst: &mut [IoSlice<'a>]) -> usize {
        let mut count = 0;
        for (slot, segment) in dst.iter_mut().zip(&self.segments[self.index..]) {
            *slot = IoSlice::new(segment);
            count += 1;
        }
        count
    }

    /// Mark `n` bytes as written.
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.remaining);
        self.remaining -= n;

        let mut left = n;
        while left > 0 {
            let segment = &mut self.segments[self.index];
            if segment.len() <= left {
                left -= segment.len();
                self.index += 1;
            } else {
                segment.advance(left);
                left = 0;
            }
        }
    }
}

/// Write one payload and flush.
pub(crate) async fn write_payload<W>(
    writer: &mut W,
    payload: ByteSeq,
    scatter: &mut ScatterList,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.is_single_segment() {
        writer.write_all(payload.first()).await?;
        return writer.flush().await;
    }

    scatter.load(payload);

    while scatter.remaining() > 0 {
        let written = {
            let mut slices = [IoSlice::new(&[]); MAX_IOVECS];
            let count = scatter.fill_slices(&mut slices);
            writer.write_vectored(&slices[..count]).await?
        };

        if written == 0 {
            scatter.clear();
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            ));
        }

        scatter.advance(written);
    }

    scatter.clear();
    writer.flush().await
}

/// How the send loop ended.
enum SendExit {
    /// The channel was closed; stop immediately.
    Closed,
    /// The receive side finished; drain what is queued, then close.
    Completed(CloseReason),
}

/// Main send loop.
///
/// Runs until the channel is closed or the receive side marks the outbound
/// queue complete. Always shuts the write direction down before returning.
pub(crate) async fn send_loop<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<ByteSeq>,
    inner: Arc<ChannelInner>,
) where
    W: AsyncWrite + Unpin,
{
    let mut shutdown = inner.shutdown_signal();
    let mut completion = inner.completion_signal();
    let mut scatter = ScatterList::new();

    // Dropping every handle closes the queue but not the channel; the loop
    // then waits for a close or for the receive side to finish.
    let mut queue_open = true;

    let exit = loop {
        let payload = tokio::select! {
            biased;
            _ = signalled(&mut shutdown) => break SendExit::Closed,
            item = outbound.recv(), if queue_open => match item {
                Some(payload) => payload,
                None => {
                    queue_open = false;
                    continue;
                }
            },
            reason = signalled(&mut completion) => break SendExit::Completed(reason),
        };

        if !send_one(&mut writer, payload, &mut scatter, &inner, &mut shutdown).await {
            break SendExit::Closed;
        }
    };

    // Late senders now see `ConnectionClosed`; what was accepted is still drained.
    outbound.close();

    if let SendExit::Completed(reason) = exit {
        while let Ok(payload) = outbound.try_recv() {
            if !send_one(&mut writer, payload, &mut scatter, &inner, &mut shutdown).await {
                break;
            }
        }
        inner.close_with(reason);
    }

    // Anything still queued was reserved by a caller; give it back.
    while let Ok(payload) = outbound.try_recv() {
        inner.backpressure().release(payload.len());
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!("Write shutdown failed: {}", e);
    }
    tracing::debug!("Send loop finished");
}

/// Write one payload unless the channel closes first.
///
/// Returns `false` when the loop should stop.
async fn send_one<W>(
    writer: &mut W,
    payload: ByteSeq,
    scatter: &mut ScatterList,
    inner: &ChannelInner,
    shutdown: &mut watch::Receiver<Option<CloseReason>>,
) -> bool
where
    W: AsyncWrite + Unpin,
{
    let len = payload.len();

    let result = tokio::select! {
        biased;
        _ = signalled(shutdown) => None,
        result = write_payload(writer, payload, scatter) => Some(result),
    };

    inner.backpressure().release(len);

    match result {
        Some(Ok(())) => true,
        Some(Err(e)) => {
            tracing::error!("Send failed: {}", e);
            inner.close_with(CloseReason::SocketError);
            false
        }
        None => false,
    }
}
