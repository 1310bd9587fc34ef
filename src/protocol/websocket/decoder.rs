//! WebSocket frame decoder.
//!
//! Drives the [`FramePart`] chain over a [`SegmentedBuf`]. Between calls the
//! decoder remembers only which part to resume at and the fields decoded so
//! far, so frames may be split across any number of socket reads.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use sockpipe::buffer::SegmentedBuf;
//! use sockpipe::protocol::Decoder;
//! use sockpipe::protocol::websocket::{OpCode, WebSocketDecoder};
//!
//! let mut decoder = WebSocketDecoder::new();
//! let mut buf = SegmentedBuf::new();
//!
//! buf.push(Bytes::from_static(b"\x81\x05hel"));
//! assert!(decoder.decode(&mut buf).unwrap().is_none());
//!
//! buf.push(Bytes::from_static(b"lo"));
//! let frame = decoder.decode(&mut buf).unwrap().unwrap();
//! assert_eq!(frame.opcode, OpCode::Text);
//! assert_eq!(frame.payload.to_vec(), b"hello".to_vec());
//! ```

use crate::buffer::SegmentedBuf;
use crate::error::Result;
use crate::options::{ChannelOptions, DEFAULT_MAX_PACKAGE_LENGTH};
use crate::protocol::Decoder;

use super::frame::WebSocketFrame;
use super::part::{FramePart, PartialFrame, Step};

/// Resumable decoder producing one [`WebSocketFrame`] per completion.
#[derive(Debug)]
pub struct WebSocketDecoder {
    /// Part to run on the next call.
    part: FramePart,
    /// Fields decoded so far for the frame in progress.
    frame: PartialFrame,
    /// Maximum payload length, `None` for unlimited.
    max_payload: Option<u64>,
}

impl WebSocketDecoder {
    /// Create a decoder with the default 4 MiB payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PACKAGE_LENGTH as u64)
    }

    /// Create a decoder with a custom payload limit (0 = unlimited).
    pub fn with_max_payload(max_payload: u64) -> Self {
        Self {
            part: FramePart::FixedHeader,
            frame: PartialFrame::default(),
            max_payload: (max_payload > 0).then_some(max_payload),
        }
    }

    /// Create a decoder using the channel's maximum package length.
    pub fn from_options(options: &ChannelOptions) -> Self {
        Self::with_max_payload(options.max_package_length as u64)
    }

    /// Part the next call resumes at.
    #[inline]
    pub fn current_part(&self) -> FramePart {
        self.part
    }

    /// Configured payload limit.
    #[inline]
    pub fn max_payload(&self) -> Option<u64> {
        self.max_payload
    }
}

impl Default for WebSocketDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for WebSocketDecoder {
    type Unit = WebSocketFrame;

    fn decode(&mut self, buf: &mut SegmentedBuf) -> Result<Option<WebSocketFrame>> {
        loop {
            match self.part.process(&mut self.frame, buf, self.max_payload)? {
                Step::NeedMore => {
                    tracing::trace!(
                        part = ?self.part,
                        buffered = buf.len(),
                        "frame part waiting for more data"
                    );
                    return Ok(None);
                }
                Step::Next(part) => self.part = part,
                Step::Complete => {
                    self.part = FramePart::FixedHeader;
                    let frame = std::mem::take(&mut self.frame).into_frame();
                    return Ok(Some(frame));
                }
            }
        }
    }

    fn reset(&mut self) {
        self.part = FramePart::FixedHeader;
        self.frame = PartialFrame::default();
    }
}
