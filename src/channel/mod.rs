//! Socket channel: one connection driven by three loops.
//!
//! ```text
//!            ┌──────────────┐  Bytes   ┌─────────────┐  Unit   ┌────────────┐
//! socket ──► │ receive loop │ ───────► │ decode loop │ ──────► │ UnitStream │
//!            └──────────────┘  (mpsc)  └─────────────┘  (mpsc) └────────────┘
//!
//!            ┌──────────────┐ ByteSeq  ┌───────────┐
//! Channel ─► │  backpressure │ ───────► │ send loop │ ──► socket
//!            └──────────────┘  (mpsc)  └───────────┘
//! ```
//!
//! The loops share nothing but the two queues and a close signal. Close is
//! decided by a single atomic swap: whoever wins records the [`CloseReason`]
//! and every loop stops; everyone else gets `false`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sockpipe::protocol::websocket::WebSocketDecoder;
//! use sockpipe::{Channel, ChannelOptions};
//!
//! # async fn run(stream: tokio::net::TcpStream) -> sockpipe::Result<()> {
//! let options = Arc::new(ChannelOptions::default());
//! let decoder = WebSocketDecoder::from_options(&options);
//! let mut parts = Channel::open(stream, decoder, options)?;
//!
//! while let Some(frame) = parts.units.recv().await {
//!     parts.channel.send(frame.payload.clone()).await?;
//! }
//!
//! let reason = parts.channel.closed().await;
//! println!("closed: {:?}", reason);
//! # Ok(())
//! # }
//! ```

mod decode;
mod receive;

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::backpressure::{BackpressureController, BackpressureGuard};
use crate::buffer::ByteSeq;
use crate::error::{ChannelError, Result};
use crate::options::ChannelOptions;
use crate::protocol::Decoder;
use crate::writer::send_loop;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Why a channel closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `Channel::close` was called, or the unit subscriber went away.
    LocalClosing,
    /// The peer finished its side of the stream.
    RemoteClosing,
    /// The decoder rejected the inbound bytes.
    ProtocolError,
    /// A socket receive or send failed.
    SocketError,
}

/// State shared by the handle and the three loops.
pub(crate) struct ChannelInner {
    id: u64,
    peer: Option<SocketAddr>,
    options: Arc<ChannelOptions>,
    closed: AtomicBool,
    /// Close signal every loop selects on.
    shutdown: watch::Sender<Option<CloseReason>>,
    /// Set by the receive side when no more inbound data will arrive.
    completion: watch::Sender<Option<CloseReason>>,
    backpressure: BackpressureController,
}

impl ChannelInner {
    pub(crate) fn new(options: Arc<ChannelOptions>, peer: Option<SocketAddr>) -> Self {
        let backpressure =
            BackpressureController::new(options.send_buffer_size, options.send_timeout());
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            options,
            closed: AtomicBool::new(false),
            shutdown: watch::channel(None).0,
            completion: watch::channel(None).0,
            backpressure,
        }
    }

    /// Close the channel. Returns `true` only for the caller that won.
    pub fn close_with(&self, reason: CloseReason) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::debug!(?reason, "Channel closed");
        self.shutdown.send_replace(Some(reason));
        true
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.shutdown.borrow()
    }

    /// Tell the send loop that no more inbound data is coming.
    ///
    /// The first reason sticks.
    pub fn complete_outbound(&self, reason: CloseReason) {
        self.completion.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<Option<CloseReason>> {
        self.shutdown.subscribe()
    }

    pub fn completion_signal(&self) -> watch::Receiver<Option<CloseReason>> {
        self.completion.subscribe()
    }

    #[inline]
    pub fn backpressure(&self) -> &BackpressureController {
        &self.backpressure
    }

    #[inline]
    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }
}

/// Wait until `signal` carries a reason.
pub(crate) async fn signalled(signal: &mut watch::Receiver<Option<CloseReason>>) -> CloseReason {
    let reason = signal.wait_for(Option::is_some).await.ok().and_then(|r| *r);
    reason.unwrap_or(CloseReason::LocalClosing)
}

/// Handle to an open channel.
///
/// Cheap to clone. Dropping every handle leaves the channel open for
/// receiving; it closes on `close`, peer close or an error.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
    outbound: mpsc::Sender<ByteSeq>,
}

/// Everything [`Channel::open`] hands back.
pub struct ChannelParts<T> {
    /// Send/close handle.
    pub channel: Channel,
    /// Decoded units, in arrival order.
    pub units: UnitStream<T>,
    /// The three loop tasks.
    pub tasks: ChannelTasks,
}

impl<T> fmt::Debug for ChannelParts<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelParts")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Open a channel over any bidirectional stream.
    ///
    /// Spawns the receive, decode and send loops on the current runtime.
    pub fn open<S, D>(
        stream: S,
        decoder: D,
        options: Arc<ChannelOptions>,
    ) -> Result<ChannelParts<D::Unit>>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
        D: Decoder,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::open_split(reader, writer, decoder, options, None)
    }

    /// Open a channel over an already split stream.
    pub fn open_split<R, W, D>(
        reader: R,
        writer: W,
        decoder: D,
        options: Arc<ChannelOptions>,
        peer: Option<SocketAddr>,
    ) -> Result<ChannelParts<D::Unit>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        D: Decoder,
    {
        options.validate()?;

        let (inbound_tx, inbound_rx) = mpsc::channel(options.inbound_queue_depth);
        let (outbound_tx, outbound_rx) = mpsc::channel(options.outbound_queue_capacity);
        let (units_tx, units_rx) = mpsc::channel(options.unit_queue_capacity);

        let inner = Arc::new(ChannelInner::new(options, peer));
        let span = tracing::info_span!("channel", id = inner.id, peer = ?peer);

        let receive = tokio::spawn(
            receive::receive_loop(reader, inbound_tx, inner.clone()).instrument(span.clone()),
        );
        let decode = tokio::spawn(
            decode::decode_loop(decoder, inbound_rx, units_tx, inner.clone())
                .instrument(span.clone()),
        );
        let send = tokio::spawn(send_loop(writer, outbound_rx, inner.clone()).instrument(span));

        Ok(ChannelParts {
            channel: Channel {
                inner,
                outbound: outbound_tx,
            },
            units: UnitStream { rx: units_rx },
            tasks: ChannelTasks {
                receive,
                decode,
                send,
            },
        })
    }

    /// Queue a payload for sending.
    ///
    /// Waits up to the send timeout for outbound backpressure to clear.
    /// Empty payloads are accepted and dropped.
    pub async fn send(&self, payload: impl Into<ByteSeq>) -> Result<()> {
        let payload = payload.into();
        if self.is_closed() {
            return Err(ChannelError::ConnectionClosed);
        }
        if payload.is_empty() {
            return Ok(());
        }

        let len = payload.len();
        let backpressure = self.inner.backpressure();
        backpressure.reserve(len).await?;
        let mut guard = BackpressureGuard::new(backpressure.clone(), len);

        match self
            .outbound
            .send_timeout(payload, self.inner.options().send_timeout())
            .await
        {
            Ok(()) => {
                guard.disarm();
                Ok(())
            }
            Err(SendTimeoutError::Timeout(_)) => Err(ChannelError::BackpressureTimeout),
            Err(SendTimeoutError::Closed(_)) => Err(ChannelError::ConnectionClosed),
        }
    }

    /// Queue a payload without waiting.
    ///
    /// Returns `Err(BackpressureTimeout)` when the channel cannot take it now.
    pub fn try_send(&self, payload: impl Into<ByteSeq>) -> Result<()> {
        let payload = payload.into();
        if self.is_closed() {
            return Err(ChannelError::ConnectionClosed);
        }
        if payload.is_empty() {
            return Ok(());
        }

        let len = payload.len();
        let backpressure = self.inner.backpressure();
        backpressure.try_reserve(len)?;
        let mut guard = BackpressureGuard::new(backpressure.clone(), len);

        match self.outbound.try_send(payload) {
            Ok(()) => {
                guard.disarm();
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(ChannelError::BackpressureTimeout),
            Err(TrySendError::Closed(_)) => Err(ChannelError::ConnectionClosed),
        }
    }

    /// Close the channel.
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.inner.close_with(CloseReason::LocalClosing)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Why the channel closed, `None` while open.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.inner.close_reason()
    }

    /// Wait for the channel to close.
    pub async fn closed(&self) -> CloseReason {
        let mut signal = self.inner.shutdown_signal();
        signalled(&mut signal).await
    }

    /// Process-unique channel id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer
    }

    pub fn options(&self) -> &ChannelOptions {
        self.inner.options()
    }

    /// Bytes queued but not yet written.
    pub fn pending_send_bytes(&self) -> usize {
        self.inner.backpressure().pending_bytes()
    }

    /// Check if senders currently have to wait.
    pub fn is_backpressure_active(&self) -> bool {
        self.inner.backpressure().is_active()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("peer", &self.inner.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Single-consumer subscription to decoded units.
#[derive(Debug)]
pub struct UnitStream<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> UnitStream<T> {
    /// Next unit, or `None` once the decode loop has finished.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Next unit if one is ready.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// Join handles of a channel's loops.
#[derive(Debug)]
pub struct ChannelTasks {
    receive: JoinHandle<()>,
    decode: JoinHandle<()>,
    send: JoinHandle<()>,
}

impl ChannelTasks {
    /// Wait for all three loops to finish.
    pub async fn join(self) {
        for (name, handle) in [
            ("receive", self.receive),
            ("decode", self.decode),
            ("send", self.send),
        ] {
            if let Err(e) = handle.await {
                tracing::error!("Channel {} task failed: {}", name, e);
            }
        }
    }
}
