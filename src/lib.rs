//! # sockpipe
//!
//! Socket channel core with a resumable WebSocket frame decoder.
//!
//! Each connection becomes a [`Channel`] driven by three loops:
//!
//! - **Receive**: socket reads, committed to a bounded inbound queue
//! - **Decode**: a pluggable [`protocol::Decoder`] turns buffered bytes into units
//! - **Send**: queued payloads written in order, scatter-writing multi-segment ones
//!
//! Close is idempotent: exactly one trigger (local call, peer close,
//! protocol violation or socket error) shuts the socket down and records
//! the [`CloseReason`].
//!
//! ## Example
//!
//! ```no_run
//! use sockpipe::protocol::websocket::{build_frame_parts, OpCode, WebSocketDecoder};
//! use sockpipe::transport::ChannelListener;
//! use sockpipe::ChannelOptions;
//!
//! #[tokio::main]
//! async fn main() -> sockpipe::Result<()> {
//!     let listener = ChannelListener::bind(
//!         "127.0.0.1:9000",
//!         ChannelOptions::default(),
//!         WebSocketDecoder::from_options,
//!     )
//!     .await?;
//!
//!     let mut parts = listener.accept().await?;
//!     while let Some(frame) = parts.units.recv().await {
//!         let echo = build_frame_parts(frame.opcode, true, frame.payload.clone());
//!         parts.channel.send(echo).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod channel;
pub mod error;
pub mod options;
pub mod protocol;
pub mod transport;

mod backpressure;
mod writer;

pub use channel::{Channel, ChannelParts, ChannelTasks, CloseReason, UnitStream};
pub use error::{ChannelError, Result};
pub use options::ChannelOptions;
