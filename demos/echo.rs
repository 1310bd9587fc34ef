//! Echo server - every WebSocket frame received is sent straight back.
//!
//! This example demonstrates:
//! - Accepting connections with `ChannelListener`
//! - Reading decoded frames from the unit stream
//! - Echoing payloads without copying them, via `build_frame_parts`
//!
//! # Running
//!
//! ```text
//! RUST_LOG=sockpipe=debug cargo run --example echo -- 127.0.0.1:9000
//! ```
//!
//! Frames are raw RFC 6455 frames; there is no HTTP upgrade handshake.

use sockpipe::protocol::websocket::{build_frame_parts, OpCode, WebSocketDecoder, WebSocketFrame};
use sockpipe::transport::ChannelListener;
use sockpipe::{ChannelOptions, ChannelParts};
use tracing_subscriber::EnvFilter;

async fn echo(mut parts: ChannelParts<WebSocketFrame>) {
    while let Some(frame) = parts.units.recv().await {
        if frame.opcode == OpCode::Close {
            parts.channel.close();
            break;
        }
        let reply = build_frame_parts(frame.opcode, frame.fin, frame.payload.clone());
        if let Err(e) = parts.channel.send(reply).await {
            tracing::warn!(channel = parts.channel.id(), "Echo failed: {}", e);
            break;
        }
    }

    let reason = parts.channel.closed().await;
    tracing::info!(channel = parts.channel.id(), ?reason, "Connection finished");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9000".to_string());

    let listener = ChannelListener::bind(
        addr.as_str(),
        ChannelOptions::default(),
        WebSocketDecoder::from_options,
    )
    .await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    loop {
        let parts = listener.accept().await?;
        tracing::info!(
            channel = parts.channel.id(),
            peer = ?parts.channel.peer_addr(),
            "Accepted connection"
        );
        tokio::spawn(echo(parts));
    }
}
