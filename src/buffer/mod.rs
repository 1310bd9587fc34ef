//! Buffer module - segmented receive cursor and byte sequences.
//!
//! - [`SegmentedBuf`] accumulates committed receive chunks and is the cursor
//!   decoders read through
//! - [`ByteSeq`] is a possibly-discontiguous run of bytes, used for decoded
//!   payloads and outbound send items

mod segmented;
mod sequence;

pub use segmented::SegmentedBuf;
pub use sequence::ByteSeq;
