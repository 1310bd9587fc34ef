//! Decoder contract for the channel's decode loop.
//!
//! A decoder turns the unconsumed bytes of a [`SegmentedBuf`] into one unit
//! per successful call. It is resumable: when the buffer runs short it
//! returns `Ok(None)` without consuming anything it cannot finish with, and
//! picks up from the same point once more bytes have been pushed.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use sockpipe::buffer::SegmentedBuf;
//! use sockpipe::protocol::Decoder;
//! use sockpipe::Result;
//!
//! /// Decodes fixed 4-byte big-endian integers.
//! struct U32Decoder;
//!
//! impl Decoder for U32Decoder {
//!     type Unit = u32;
//!
//!     fn decode(&mut self, buf: &mut SegmentedBuf) -> Result<Option<u32>> {
//!         let Some(raw) = buf.peek_array::<4>() else {
//!             return Ok(None);
//!         };
//!         buf.advance(4);
//!         Ok(Some(u32::from_be_bytes(raw)))
//!     }
//! }
//!
//! let mut buf = SegmentedBuf::new();
//! buf.push(Bytes::from_static(&[0, 0, 1]));
//! assert_eq!(U32Decoder.decode(&mut buf).unwrap(), None);
//! buf.push(Bytes::from_static(&[2]));
//! assert_eq!(U32Decoder.decode(&mut buf).unwrap(), Some(258));
//! ```

use crate::buffer::SegmentedBuf;
use crate::error::Result;
use crate::options::ChannelOptions;

/// Incremental, resumable decoder of one protocol unit at a time.
pub trait Decoder: Send + 'static {
    /// The decoded unit handed to subscribers.
    type Unit: Send + 'static;

    /// Try to decode one unit from the front of `buf`.
    ///
    /// - `Ok(Some(unit))`: a unit is complete; its bytes are consumed
    /// - `Ok(None)`: more data is needed; the decoder resumes here next call
    /// - `Err(..)`: protocol violation; the channel closes the connection
    fn decode(&mut self, buf: &mut SegmentedBuf) -> Result<Option<Self::Unit>>;

    /// Discard any partially assembled unit.
    fn reset(&mut self) {}
}

/// Produces a fresh decoder for each accepted connection.
///
/// Implemented for any `Fn(&ChannelOptions) -> D`, so
/// `WebSocketDecoder::from_options` is a factory as-is.
pub trait DecoderFactory: Send + Sync + 'static {
    type Decoder: Decoder;

    fn create(&self, options: &ChannelOptions) -> Self::Decoder;
}

impl<F, D> DecoderFactory for F
where
    F: Fn(&ChannelOptions) -> D + Send + Sync + 'static,
    D: Decoder,
{
    type Decoder = D;

    fn create(&self, options: &ChannelOptions) -> D {
        self(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::websocket::WebSocketDecoder;

    fn build<F: DecoderFactory>(factory: &F, options: &ChannelOptions) -> F::Decoder {
        factory.create(options)
    }

    #[test]
    fn test_fn_factory_receives_options() {
        let options = ChannelOptions::default().with_max_package_length(64);
        let decoder = build(&WebSocketDecoder::from_options, &options);
        assert_eq!(decoder.max_payload(), Some(64));
    }

    #[test]
    fn test_factory_creates_fresh_instances() {
        let options = ChannelOptions::default();
        let factory = |_: &ChannelOptions| WebSocketDecoder::with_max_payload(0);

        let mut first = build(&factory, &options);
        let mut buf = SegmentedBuf::new();
        buf.push(bytes::Bytes::from_static(&[0x81, 0x05]));
        assert!(first.decode(&mut buf).unwrap().is_none());

        let second = build(&factory, &options);
        assert_ne!(first.current_part(), second.current_part());
    }
}
