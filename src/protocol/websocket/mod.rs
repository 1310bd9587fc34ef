//! WebSocket frame decoding.
//!
//! Only the structural frame chain lives here: header, extended length,
//! mask key and payload. Handshake, extensions, close codes and payload
//! unmasking belong to the layer above.

mod decoder;
mod frame;
mod part;

pub use decoder::WebSocketDecoder;
pub use frame::{
    build_frame, build_frame_parts, FrameHeader, OpCode, WebSocketFrame, EXTENDED_LENGTH_16,
    EXTENDED_LENGTH_64, FIXED_HEADER_SIZE, MASK_KEY_SIZE, MAX_BASE_LENGTH,
};
pub use part::FramePart;
