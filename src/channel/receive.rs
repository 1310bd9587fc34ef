//! Receive loop: socket → inbound queue.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use super::{signalled, ChannelInner, CloseReason};

/// Read from the socket and commit each chunk to the decode loop.
///
/// The commit waits while the inbound queue is full, so a slow decoder
/// stops further reads. On exit the inbound sender is dropped and the
/// outbound side is marked complete.
pub(crate) async fn receive_loop<R>(
    mut reader: R,
    inbound: mpsc::Sender<Bytes>,
    inner: Arc<ChannelInner>,
) where
    R: AsyncRead + Unpin,
{
    let mut shutdown = inner.shutdown_signal();
    let size = inner.options().receive_size();
    let mut buffer = BytesMut::with_capacity(size);

    loop {
        buffer.reserve(size);

        let read = {
            let mut region = (&mut buffer).limit(size);
            tokio::select! {
                biased;
                _ = signalled(&mut shutdown) => break,
                read = reader.read_buf(&mut region) => read,
            }
        };

        match read {
            Ok(0) => {
                tracing::debug!("Peer closed connection");
                inner.complete_outbound(CloseReason::RemoteClosing);
                break;
            }
            Ok(n) => {
                let chunk = buffer.split().freeze();
                tracing::trace!(bytes = n, "Received chunk");

                let committed = tokio::select! {
                    biased;
                    _ = signalled(&mut shutdown) => false,
                    sent = inbound.send(chunk) => sent.is_ok(),
                };
                if !committed {
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Receive failed: {}", e);
                inner.close_with(CloseReason::SocketError);
                break;
            }
        }
    }

    let reason = inner.close_reason().unwrap_or(CloseReason::LocalClosing);
    inner.complete_outbound(reason);
    tracing::debug!("Receive loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ChannelOptions;
    use tokio::io::AsyncWriteExt;

    fn inner(options: ChannelOptions) -> Arc<ChannelInner> {
        Arc::new(ChannelInner::new(Arc::new(options), None))
    }

    #[tokio::test]
    async fn test_zero_byte_receive_completes() {
        let (local, remote) = tokio::io::duplex(64);
        drop(remote);

        let inner = inner(ChannelOptions::default());
        let (tx, mut rx) = mpsc::channel(4);
        receive_loop(local, tx, inner.clone()).await;

        assert!(rx.recv().await.is_none());
        assert!(!inner.is_closed());
        assert_eq!(
            *inner.completion_signal().borrow(),
            Some(CloseReason::RemoteClosing)
        );
    }

    #[tokio::test]
    async fn test_chunks_capped_at_receive_size() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let inner = inner(ChannelOptions::default().with_receive_buffer_size(8));
        let (tx, mut rx) = mpsc::channel(16);

        remote.write_all(&[7u8; 20]).await.unwrap();
        drop(remote);
        receive_loop(local, tx, inner).await;

        let mut total = 0;
        while let Some(chunk) = rx.recv().await {
            assert!(chunk.len() <= 8);
            assert!(chunk.iter().all(|&b| b == 7));
            total += chunk.len();
        }
        assert_eq!(total, 20);
    }

    #[tokio::test]
    async fn test_full_queue_holds_reads() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let inner = inner(ChannelOptions::default().with_receive_buffer_size(4));
        let (tx, mut rx) = mpsc::channel(1);

        remote.write_all(&[1u8; 16]).await.unwrap();
        let task = tokio::spawn(receive_loop(local, tx, inner.clone()));

        tokio::task::yield_now().await;
        // One chunk queued, the next waiting on the commit.
        let first = rx.recv().await.unwrap();
        assert_eq!(first.len(), 4);

        inner.close_with(CloseReason::LocalClosing);
        task.await.unwrap();
        assert!(inner.completion_signal().borrow().is_some());
    }
}
