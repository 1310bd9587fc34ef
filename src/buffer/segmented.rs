//! Read cursor over committed receive chunks.
//!
//! The receive loop commits each socket read as a frozen `Bytes` chunk. The
//! decode loop pushes those chunks here and decoders read through the
//! cursor: peek without consuming, advance, or split off a zero-copy
//! [`ByteSeq`]. The cursor only moves forward.

use std::collections::VecDeque;

use bytes::{Buf, Bytes};

use super::ByteSeq;

/// Possibly-discontiguous buffer of unconsumed bytes.
#[derive(Debug, Default)]
pub struct SegmentedBuf {
    segments: VecDeque<Bytes>,
    len: usize,
    consumed: u64,
}

impl SegmentedBuf {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a committed chunk.
    pub fn push(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.segments.push_back(chunk);
    }

    /// Number of unconsumed bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if every buffered byte has been consumed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total bytes consumed since creation.
    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Number of chunks currently held.
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Copy the first `N` unconsumed bytes without advancing.
    ///
    /// Returns `None` if fewer than `N` bytes are buffered.
    pub fn peek_array<const N: usize>(&self) -> Option<[u8; N]> {
        if self.len < N {
            return None;
        }

        let mut out = [0u8; N];
        let mut filled = 0;

        for segment in &self.segments {
            if filled == N {
                break;
            }
            let take = (N - filled).min(segment.len());
            out[filled..filled + take].copy_from_slice(&segment[..take]);
            filled += take;
        }

        Some(out)
    }

    /// Consume `n` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n` is greater than [`len`](Self::len).
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.len, "advance {} past end of buffer ({})", n, self.len);

        let mut remaining = n;
        while remaining > 0 {
            let Some(front) = self.segments.front_mut() else {
                break;
            };
            if front.len() <= remaining {
                remaining -= front.len();
                self.segments.pop_front();
            } else {
                front.advance(remaining);
                remaining = 0;
            }
        }

        self.len -= n;
        self.consumed += n as u64;
    }

    /// Consume `n` bytes and return them as zero-copy slices.
    ///
    /// # Panics
    ///
    /// Panics if `n` is greater than [`len`](Self::len).
    pub fn split_to(&mut self, n: usize) -> ByteSeq {
        assert!(n <= self.len, "split_to {} past end of buffer ({})", n, self.len);

        let mut out = ByteSeq::new();
        let mut remaining = n;

        while remaining > 0 {
            let Some(front) = self.segments.front_mut() else {
                break;
            };
            if front.len() <= remaining {
                remaining -= front.len();
                if let Some(segment) = self.segments.pop_front() {
                    out.push(segment);
                }
            } else {
                out.push(front.split_to(remaining));
                remaining = 0;
            }
        }

        self.len -= n;
        self.consumed += n as u64;
        out
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        let dropped = self.len;
        self.segments.clear();
        self.len = 0;
        self.consumed += dropped as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf_of(chunks: &[&'static [u8]]) -> SegmentedBuf {
        let mut buf = SegmentedBuf::new();
        for chunk in chunks {
            buf.push(Bytes::from_static(chunk));
        }
        buf
    }

    #[test]
    fn test_peek_does_not_advance() {
        let buf = buf_of(&[b"ab", b"cd"]);

        assert_eq!(buf.peek_array::<3>(), Some(*b"abc"));
        assert_eq!(buf.peek_array::<3>(), Some(*b"abc"));
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.consumed(), 0);
    }

    #[test]
    fn test_peek_insufficient() {
        let buf = buf_of(&[b"abc"]);
        assert_eq!(buf.peek_array::<4>(), None);
        assert_eq!(buf.peek_array::<0>(), Some([]));
    }

    #[test]
    fn test_advance_across_segments() {
        let mut buf = buf_of(&[b"ab", b"cde", b"f"]);

        buf.advance(3);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.segment_count(), 2);
        assert_eq!(buf.peek_array::<3>(), Some(*b"def"));
        assert_eq!(buf.consumed(), 3);
    }

    #[test]
    fn test_split_to_is_zero_copy() {
        let chunk = Bytes::from_static(b"hello world");
        let mut buf = SegmentedBuf::new();
        buf.push(chunk.clone());

        let hello = buf.split_to(5);
        assert!(hello.is_single_segment());
        assert_eq!(hello.first().as_ptr(), chunk.as_ptr());
        assert_eq!(buf.peek_array::<6>(), Some(*b" world"));
    }

    #[test]
    fn test_split_to_spans_segments() {
        let mut buf = buf_of(&[b"ab", b"cd", b"ef"]);

        let seq = buf.split_to(5);
        assert_eq!(seq.segments().len(), 3);
        assert_eq!(seq.to_vec(), b"abcde".to_vec());
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.consumed(), 5);
    }

    #[test]
    fn test_empty_chunks_ignored() {
        let mut buf = SegmentedBuf::new();
        buf.push(Bytes::new());
        assert!(buf.is_empty());
        assert_eq!(buf.segment_count(), 0);
    }

    #[test]
    #[should_panic(expected = "past end of buffer")]
    fn test_advance_past_end_panics() {
        let mut buf = buf_of(&[b"ab"]);
        buf.advance(3);
    }

    #[test]
    fn test_clear_counts_as_consumed() {
        let mut buf = buf_of(&[b"abc", b"de"]);
        buf.advance(1);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.consumed(), 5);
    }
}
