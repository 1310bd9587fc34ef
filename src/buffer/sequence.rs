//! Possibly-discontiguous byte sequence.
//!
//! A [`ByteSeq`] is an ordered list of `Bytes` segments. Slicing a
//! [`SegmentedBuf`](super::SegmentedBuf) produces one without copying, and
//! the send loop writes one with a single vectored write.

use std::fmt;

use bytes::{Bytes, BytesMut};

/// Ordered, reference-counted byte segments treated as one sequence.
#[derive(Clone, Default)]
pub struct ByteSeq {
    segments: Vec<Bytes>,
    len: usize,
}

impl ByteSeq {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sequence from segments, skipping empty ones.
    pub fn from_segments<I>(segments: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        let mut seq = Self::new();
        for segment in segments {
            seq.push(segment);
        }
        seq
    }

    /// Append a segment (empty segments are dropped).
    pub fn push(&mut self, segment: Bytes) {
        if segment.is_empty() {
            return;
        }
        self.len += segment.len();
        self.segments.push(segment);
    }

    /// Total length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the sequence holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when the bytes live in at most one contiguous segment.
    #[inline]
    pub fn is_single_segment(&self) -> bool {
        self.segments.len() <= 1
    }

    /// The underlying segments, in order.
    #[inline]
    pub fn segments(&self) -> &[Bytes] {
        &self.segments
    }

    /// First segment, or an empty slice.
    #[inline]
    pub fn first(&self) -> &[u8] {
        self.segments.first().map(|s| &s[..]).unwrap_or(&[])
    }

    /// Iterate over every byte in order.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.segments.iter().flat_map(|s| s.iter().copied())
    }

    /// Collapse into one contiguous `Bytes`.
    ///
    /// Zero-copy for a single segment; multiple segments are copied once.
    pub fn to_bytes(&self) -> Bytes {
        match self.segments.as_slice() {
            [] => Bytes::new(),
            [only] => only.clone(),
            many => {
                let mut out = BytesMut::with_capacity(self.len);
                for segment in many {
                    out.extend_from_slice(segment);
                }
                out.freeze()
            }
        }
    }

    /// Copy all bytes into a `Vec`.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for segment in &self.segments {
            out.extend_from_slice(segment);
        }
        out
    }

    pub(crate) fn into_segments(self) -> Vec<Bytes> {
        self.segments
    }
}

impl fmt::Debug for ByteSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteSeq")
            .field("len", &self.len)
            .field("segments", &self.segments.len())
            .finish()
    }
}

/// Equality is by content; segmentation is ignored.
impl PartialEq for ByteSeq {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.bytes().eq(other.bytes())
    }
}

impl Eq for ByteSeq {}

impl PartialEq<[u8]> for ByteSeq {
    fn eq(&self, other: &[u8]) -> bool {
        self.len == other.len() && self.bytes().eq(other.iter().copied())
    }
}

impl From<Bytes> for ByteSeq {
    fn from(bytes: Bytes) -> Self {
        let mut seq = Self::new();
        seq.push(bytes);
        seq
    }
}

impl From<BytesMut> for ByteSeq {
    fn from(bytes: BytesMut) -> Self {
        Self::from(bytes.freeze())
    }
}

impl From<Vec<u8>> for ByteSeq {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for ByteSeq {
    fn from(bytes: &'static [u8]) -> Self {
        Self::from(Bytes::from_static(bytes))
    }
}

impl From<&'static str> for ByteSeq {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}

impl FromIterator<Bytes> for ByteSeq {
    fn from_iter<I: IntoIterator<Item = Bytes>>(iter: I) -> Self {
        Self::from_segments(iter)
    }
}
