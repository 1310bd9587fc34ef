//! WebSocket frame types and outbound header encoding.
//!
//! Frame layout:
//! ```text
//! ┌─┬───┬──────┬─┬───────┬─────────────────┬──────────┬─────────┐
//! │F│RSV│opcode│M│len(7) │ ext len (0/2/8) │ mask (0/4)│ payload │
//! │1│ 3 │  4   │1│   7   │   uint BE       │  raw      │         │
//! └─┴───┴──────┴─┴───────┴─────────────────┴──────────┴─────────┘
//! ```
//!
//! A 7-bit length of 126 means a 16-bit extended length follows, 127 a 64-bit
//! one. Masking is carried through untouched; payload bytes are never
//! unmasked here.

use bytes::{BufMut, Bytes, BytesMut};

use crate::buffer::ByteSeq;

/// Size of the fixed two-byte header.
pub const FIXED_HEADER_SIZE: usize = 2;

/// Size of the mask key.
pub const MASK_KEY_SIZE: usize = 4;

/// Largest payload length that fits in the 7-bit base length.
pub const MAX_BASE_LENGTH: u8 = 125;

/// Base length marker for a 16-bit extended length.
pub const EXTENDED_LENGTH_16: u8 = 126;

/// Base length marker for a 64-bit extended length.
pub const EXTENDED_LENGTH_64: u8 = 127;

const BASE_LENGTH_LIMIT: u64 = MAX_BASE_LENGTH as u64;
const FIN_BIT: u8 = 0b1000_0000;
const RSV_MASK: u8 = 0b0111_0000;
const OPCODE_MASK: u8 = 0b0000_1111;
const MASK_BIT: u8 = 0b1000_0000;
const BASE_LENGTH_MASK: u8 = 0b0111_1111;

/// Frame opcode.
///
/// Reserved opcodes are preserved rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OpCode {
    #[default]
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Reserved(u8),
}

impl OpCode {
    /// Decode from the low nibble of the first header byte.
    pub fn from_u8(value: u8) -> Self {
        match value & OPCODE_MASK {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            other => OpCode::Reserved(other),
        }
    }

    /// Wire value (4 bits).
    pub fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(value) => value & OPCODE_MASK,
        }
    }

    /// Control opcodes have the high bit of the nibble set.
    #[inline]
    pub fn is_control(self) -> bool {
        self.as_u8() & 0x8 != 0
    }
}

/// Fields of the fixed two-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FixedHeader {
    pub fin: bool,
    pub rsv: u8,
    pub opcode: OpCode,
    pub masked: bool,
    pub base_length: u8,
}

impl FixedHeader {
    pub fn decode(bytes: [u8; FIXED_HEADER_SIZE]) -> Self {
        let [first, second] = bytes;
        Self {
            fin: first & FIN_BIT != 0,
            rsv: (first & RSV_MASK) >> 4,
            opcode: OpCode::from_u8(first),
            masked: second & MASK_BIT != 0,
            base_length: second & BASE_LENGTH_MASK,
        }
    }
}

/// One decoded WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketFrame {
    /// Final fragment of a message.
    pub fin: bool,
    /// RSV1-3 bits, RSV1 in bit 2.
    pub rsv: u8,
    pub opcode: OpCode,
    /// Mask-present flag from the header.
    pub masked: bool,
    /// Declared payload length.
    pub payload_length: u64,
    /// Raw mask key, present exactly when `masked` is set.
    pub mask_key: Option<[u8; MASK_KEY_SIZE]>,
    /// Payload bytes as received (still masked if `masked`).
    pub payload: ByteSeq,
}

impl WebSocketFrame {
    #[inline]
    pub fn is_final(&self) -> bool {
        self.fin
    }

    #[inline]
    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }

    #[inline]
    pub fn payload(&self) -> &ByteSeq {
        &self.payload
    }

    /// Payload length actually extracted.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// Header of an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub opcode: OpCode,
    pub payload_length: u64,
    pub mask_key: Option<[u8; MASK_KEY_SIZE]>,
}

impl FrameHeader {
    /// Create a final, unmasked header.
    pub fn new(opcode: OpCode, payload_length: u64) -> Self {
        Self {
            fin: true,
            opcode,
            payload_length,
            mask_key: None,
        }
    }

    /// Set the final-fragment flag.
    pub fn with_fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    /// Attach a mask key (the payload is not transformed).
    pub fn with_mask_key(mut self, mask_key: [u8; MASK_KEY_SIZE]) -> Self {
        self.mask_key = Some(mask_key);
        self
    }

    /// Encoded header size, using the shortest length form.
    pub fn encoded_len(&self) -> usize {
        let extended = match self.payload_length {
            0..=BASE_LENGTH_LIMIT => 0,
            126..=0xFFFF => 2,
            _ => 8,
        };
        let mask = if self.mask_key.is_some() { MASK_KEY_SIZE } else { 0 };
        FIXED_HEADER_SIZE + extended + mask
    }

    /// Encode the header into a new buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Append the encoded header to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        let mut first = self.opcode.as_u8();
        if self.fin {
            first |= FIN_BIT;
        }
        buf.put_u8(first);

        let mask_bit = if self.mask_key.is_some() { MASK_BIT } else { 0 };
        match self.payload_length {
            len @ 0..=BASE_LENGTH_LIMIT => buf.put_u8(mask_bit | len as u8),
            len @ 126..=0xFFFF => {
                buf.put_u8(mask_bit | EXTENDED_LENGTH_16);
                buf.put_u16(len as u16);
            }
            len => {
                buf.put_u8(mask_bit | EXTENDED_LENGTH_64);
                buf.put_u64(len);
            }
        }

        if let Some(key) = self.mask_key {
            buf.put_slice(&key);
        }
    }
}

/// Build a complete frame as a single contiguous buffer.
///
/// Use [`build_frame_parts`] to send without copying the payload.
///
/// # Example
///
/// ```
/// use sockpipe::protocol::websocket::{build_frame, FrameHeader, OpCode};
///
/// let bytes = build_frame(&FrameHeader::new(OpCode::Text, 5), b"hello");
/// assert_eq!(&bytes[..], b"\x81\x05hello");
/// ```
pub fn build_frame(header: &FrameHeader, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(header.encoded_len() + payload.len());
    header.encode_into(&mut buf);
    buf.put_slice(payload);
    buf.freeze()
}

/// Build a frame as `[header, payload segments...]` for scatter sends.
///
/// The header's length is taken from the payload.
pub fn build_frame_parts(opcode: OpCode, fin: bool, payload: impl Into<ByteSeq>) -> ByteSeq {
    let payload = payload.into();
    let header = FrameHeader::new(opcode, payload.len() as u64).with_fin(fin);

    let mut parts = ByteSeq::from(header.encode());
    for segment in payload.into_segments() {
        parts.push(segment);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip_known() {
        for opcode in [
            OpCode::Continuation,
            OpCode::Text,
            OpCode::Binary,
            OpCode::Close,
            OpCode::Ping,
            OpCode::Pong,
        ] {
            assert_eq!(OpCode::from_u8(opcode.as_u8()), opcode);
        }
    }

    #[test]
    fn test_opcode_reserved_preserved() {
        assert_eq!(OpCode::from_u8(0x3), OpCode::Reserved(0x3));
        assert_eq!(OpCode::from_u8(0xB), OpCode::Reserved(0xB));
        assert!(OpCode::Reserved(0xB).is_control());
        assert!(!OpCode::Reserved(0x3).is_control());
    }

    #[test]
    fn test_opcode_control_classification() {
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
        assert!(!OpCode::Text.is_control());
        assert!(!OpCode::Binary.is_control());
        assert!(!OpCode::Continuation.is_control());
    }

    #[test]
    fn test_fixed_header_decode() {
        let header = FixedHeader::decode([0b1010_0010, 0b1111_1110]);
        assert!(header.fin);
        assert_eq!(header.rsv, 0b010);
        assert_eq!(header.opcode, OpCode::Binary);
        assert!(header.masked);
        assert_eq!(header.base_length, EXTENDED_LENGTH_16);
    }

    #[test]
    fn test_encode_length_forms() {
        assert_eq!(FrameHeader::new(OpCode::Text, 125).encoded_len(), 2);
        assert_eq!(FrameHeader::new(OpCode::Text, 126).encoded_len(), 4);
        assert_eq!(FrameHeader::new(OpCode::Text, 65535).encoded_len(), 4);
        assert_eq!(FrameHeader::new(OpCode::Text, 65536).encoded_len(), 10);

        let encoded = FrameHeader::new(OpCode::Binary, 300).encode();
        assert_eq!(&encoded[..], &[0x82, 126, 0x01, 0x2C]);

        let encoded = FrameHeader::new(OpCode::Binary, 65536).encode();
        assert_eq!(&encoded[..], &[0x82, 127, 0, 0, 0, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_encode_with_mask_and_fin() {
        let header = FrameHeader::new(OpCode::Ping, 0)
            .with_fin(false)
            .with_mask_key([1, 2, 3, 4]);

        assert_eq!(header.encoded_len(), 6);
        assert_eq!(&header.encode()[..], &[0x09, 0x80, 1, 2, 3, 4]);
    }

    #[test]
    fn test_build_frame_parts_keeps_payload_segments() {
        let payload = ByteSeq::from_segments([Bytes::from_static(b"ab"), Bytes::from_static(b"cd")]);
        let parts = build_frame_parts(OpCode::Text, true, payload);

        assert_eq!(parts.segments().len(), 3);
        assert_eq!(parts.to_vec(), b"\x81\x04abcd".to_vec());
    }
}
