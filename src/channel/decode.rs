//! Decode loop: inbound queue → decoder → unit subscribers.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use super::{ChannelInner, CloseReason};
use crate::buffer::SegmentedBuf;
use crate::protocol::Decoder;

/// Resolves once the channel is closed for any reason but a peer close.
///
/// After a peer close the bytes already received are still decoded.
async fn aborted(shutdown: &mut watch::Receiver<Option<CloseReason>>) {
    let _ = shutdown
        .wait_for(|reason| matches!(reason, Some(r) if *r != CloseReason::RemoteClosing))
        .await;
}

pub(crate) async fn decode_loop<D>(
    mut decoder: D,
    mut inbound: mpsc::Receiver<Bytes>,
    units: mpsc::Sender<D::Unit>,
    inner: Arc<ChannelInner>,
) where
    D: Decoder,
{
    let mut shutdown = inner.shutdown_signal();
    let mut buf = SegmentedBuf::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = aborted(&mut shutdown) => break,
            chunk = inbound.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };
        buf.push(chunk);

        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(unit)) => {
                    let delivered = tokio::select! {
                        biased;
                        _ = aborted(&mut shutdown) => return,
                        sent = units.send(unit) => sent.is_ok(),
                    };
                    if !delivered {
                        tracing::debug!("Unit subscriber dropped");
                        inner.close_with(CloseReason::LocalClosing);
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    if e.is_protocol_violation() {
                        tracing::warn!(consumed = buf.consumed(), "Protocol violation: {}", e);
                    } else {
                        tracing::error!(consumed = buf.consumed(), "Decoder failed: {}", e);
                    }
                    inner.close_with(CloseReason::ProtocolError);
                    return;
                }
            }
        }
    }

    if !buf.is_empty() {
        tracing::debug!(buffered = buf.len(), "Discarding partial unit");
    }
    tracing::debug!("Decode loop finished");
}
