//! Frame part stages.
//!
//! Each [`FramePart`] reads one piece of a frame and names the part that
//! follows it:
//!
//! ```text
//! FixedHeader ─┬─────────────────────┬─► MaskKey ─► PayloadData ─► done
//!              ├─► ExtendedLength16 ─┤      (if masked)
//!              └─► ExtendedLength64 ─┘
//! ```
//!
//! Parts carry no state. Everything learned so far lives in the
//! [`PartialFrame`] owned by the decoder.

use crate::buffer::{ByteSeq, SegmentedBuf};
use crate::error::{ChannelError, Result};

use super::frame::{
    FixedHeader, OpCode, WebSocketFrame, EXTENDED_LENGTH_16, EXTENDED_LENGTH_64,
    FIXED_HEADER_SIZE, MASK_KEY_SIZE,
};

/// One stage of the frame decode chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePart {
    #[default]
    FixedHeader,
    ExtendedLength16,
    ExtendedLength64,
    MaskKey,
    PayloadData,
}

/// Result of running one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Not enough bytes; nothing consumed, retry the same part.
    NeedMore,
    /// Part consumed its bytes; continue with the given part.
    Next(FramePart),
    /// Terminal part finished; the frame is complete.
    Complete,
}

/// Frame fields gathered across parts.
#[derive(Debug, Default)]
pub(crate) struct PartialFrame {
    fin: bool,
    rsv: u8,
    opcode: OpCode,
    masked: bool,
    payload_length: u64,
    mask_key: Option<[u8; MASK_KEY_SIZE]>,
    payload: ByteSeq,
}

impl PartialFrame {
    pub fn into_frame(self) -> WebSocketFrame {
        WebSocketFrame {
            fin: self.fin,
            rsv: self.rsv,
            opcode: self.opcode,
            masked: self.masked,
            payload_length: self.payload_length,
            mask_key: self.mask_key,
            payload: self.payload,
        }
    }

    /// Record the payload length, enforcing the configured maximum.
    fn set_payload_length(&mut self, length: u64, max: Option<u64>) -> Result<()> {
        if let Some(max) = max {
            if length > max {
                return Err(ChannelError::PayloadTooLarge { length, max });
            }
        }
        self.payload_length = length;
        Ok(())
    }

    /// Part that follows a known payload length.
    fn after_length(&self) -> FramePart {
        if self.masked {
            FramePart::MaskKey
        } else {
            FramePart::PayloadData
        }
    }
}

impl FramePart {
    /// Bytes this part needs before it can make progress.
    pub fn required(self, frame_payload_length: u64) -> u64 {
        match self {
            FramePart::FixedHeader => FIXED_HEADER_SIZE as u64,
            FramePart::ExtendedLength16 => 2,
            FramePart::ExtendedLength64 => 8,
            FramePart::MaskKey => MASK_KEY_SIZE as u64,
            FramePart::PayloadData => frame_payload_length,
        }
    }

    /// Run this part against the front of `buf`.
    ///
    /// The cursor is advanced only when the part has all of its bytes.
    pub(crate) fn process(
        self,
        frame: &mut PartialFrame,
        buf: &mut SegmentedBuf,
        max_payload: Option<u64>,
    ) -> Result<Step> {
        match self {
            FramePart::FixedHeader => {
                let Some(raw) = buf.peek_array::<FIXED_HEADER_SIZE>() else {
                    return Ok(Step::NeedMore);
                };
                let header = FixedHeader::decode(raw);
                frame.fin = header.fin;
                frame.rsv = header.rsv;
                frame.opcode = header.opcode;
                frame.masked = header.masked;

                let next = match header.base_length {
                    EXTENDED_LENGTH_16 => FramePart::ExtendedLength16,
                    EXTENDED_LENGTH_64 => FramePart::ExtendedLength64,
                    length => {
                        frame.set_payload_length(u64::from(length), max_payload)?;
                        frame.after_length()
                    }
                };

                buf.advance(FIXED_HEADER_SIZE);
                Ok(Step::Next(next))
            }

            FramePart::ExtendedLength16 => {
                let Some(raw) = buf.peek_array::<2>() else {
                    return Ok(Step::NeedMore);
                };
                frame.set_payload_length(u64::from(u16::from_be_bytes(raw)), max_payload)?;
                buf.advance(2);
                Ok(Step::Next(frame.after_length()))
            }

            FramePart::ExtendedLength64 => {
                let Some(raw) = buf.peek_array::<8>() else {
                    return Ok(Step::NeedMore);
                };
                frame.set_payload_length(u64::from_be_bytes(raw), max_payload)?;
                buf.advance(8);
                Ok(Step::Next(frame.after_length()))
            }

            FramePart::MaskKey => {
                // Copied out: the chunk it came from may be released before
                // the frame is handed over.
                let Some(key) = buf.peek_array::<MASK_KEY_SIZE>() else {
                    return Ok(Step::NeedMore);
                };
                buf.advance(MASK_KEY_SIZE);
                frame.mask_key = Some(key);
                Ok(Step::Next(FramePart::PayloadData))
            }

            FramePart::PayloadData => {
                let required = self.required(frame.payload_length);
                if required == 0 {
                    frame.payload = ByteSeq::new();
                    return Ok(Step::Complete);
                }
                if (buf.len() as u64) < required {
                    return Ok(Step::NeedMore);
                }
                frame.payload = buf.split_to(required as usize);
                Ok(Step::Complete)
            }
        }
    }
}
