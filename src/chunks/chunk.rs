use crate::common::Timestamp;
use crate::error::{StoreError, StoreResult};
use std::fmt::Display;

/// Identifies the byte layout of a chunk.
///
/// Only [`ChunkEncoding::Bytes`] is in active use. `Timestamps` and `Values`
/// are reserved for future column-style layouts, and `Xor` is disabled
/// outright: any code path that touches it aborts, since reaching it is a
/// programming error rather than a runtime condition.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum ChunkEncoding {
    None = 0,
    #[default]
    Bytes = 1,
    Timestamps = 2,
    Values = 3,
    Xor = 4,
}

impl ChunkEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            ChunkEncoding::None => "none",
            ChunkEncoding::Bytes => "bytes",
            ChunkEncoding::Timestamps => "timestamps",
            ChunkEncoding::Values => "values",
            ChunkEncoding::Xor => "xor",
        }
    }

    pub fn tag(&self) -> u8 {
        *self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ChunkEncoding::None),
            1 => Some(ChunkEncoding::Bytes),
            2 => Some(ChunkEncoding::Timestamps),
            3 => Some(ChunkEncoding::Values),
            4 => Some(ChunkEncoding::Xor),
            _ => None,
        }
    }
}

impl Display for ChunkEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Renders a possibly-unknown encoding tag.
pub fn tag_name(tag: u8) -> &'static str {
    match ChunkEncoding::from_tag(tag) {
        Some(encoding) => encoding.name(),
        None => "<unknown>",
    }
}

/// A contiguous buffer holding an ordered run of timestamped samples.
pub trait Chunk {
    /// Encoding tag of this chunk.
    fn encoding(&self) -> ChunkEncoding;

    /// Appends one sample. Timestamps must be non-decreasing across calls
    /// within a chunk; payloads of any length are stored without truncation.
    ///
    /// An implementation at its sample capacity, or whose loaded buffer
    /// failed validation, drops the append with a logged warning instead of
    /// corrupting the buffer. [`Chunk::num_samples`] is the authority on what
    /// was actually stored; callers cutting chunks watch it to stay below
    /// capacity.
    fn append(&mut self, timestamp: Timestamp, value: &[u8]);

    /// Cursor over the chunk's samples in timestamp order. The cursor borrows
    /// the chunk, so callers must not assume an independent instance.
    fn iterator(&self) -> Box<dyn ChunkIterator + '_>;

    /// Serialized representation of the current state. Idempotent and
    /// side-effect-free with respect to iteration.
    fn bytes(&self) -> StoreResult<Vec<u8>>;

    /// Number of samples appended since creation, or since load from bytes.
    fn num_samples(&self) -> usize;

    /// Advisory storage optimization hook, called when no more appends are
    /// expected. Appending afterwards stays legal. A no-op is a valid
    /// implementation; data must never be lost.
    fn compact(&mut self) {}
}

/// Cursor over a chunk's samples in timestamp-increasing order.
pub trait ChunkIterator {
    /// Advances by one sample. Returns false once the chunk is exhausted or a
    /// decode fault occurred; check [`ChunkIterator::err`] to tell the two
    /// apart.
    fn next(&mut self) -> bool;

    /// Advances to the first sample with timestamp >= `t`. If the current
    /// sample already satisfies this, seek is a no-op returning true. Returns
    /// false, leaving the cursor exhausted, when no such sample exists.
    fn seek(&mut self, t: Timestamp) -> bool;

    /// The current timestamp/payload pair. Behavior is unspecified before the
    /// first successful `next`/`seek` and after exhaustion.
    fn at(&self) -> (Timestamp, &[u8]);

    /// The decode fault, if any. Meaningful only after `next` or `seek`
    /// returned false; None means plain end-of-data.
    fn err(&self) -> Option<&StoreError>;
}

/// Iterator holding no data, for callers that need a valid-but-empty cursor.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopIterator;

impl ChunkIterator for NopIterator {
    fn next(&mut self) -> bool {
        false
    }

    fn seek(&mut self, _t: Timestamp) -> bool {
        false
    }

    fn at(&self) -> (Timestamp, &[u8]) {
        (Timestamp::MIN, &[])
    }

    fn err(&self) -> Option<&StoreError> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_tag_round_trip() {
        for encoding in [
            ChunkEncoding::None,
            ChunkEncoding::Bytes,
            ChunkEncoding::Timestamps,
            ChunkEncoding::Values,
            ChunkEncoding::Xor,
        ] {
            assert_eq!(ChunkEncoding::from_tag(encoding.tag()), Some(encoding));
        }
        assert_eq!(ChunkEncoding::from_tag(200), None);
    }

    #[test]
    fn test_tag_name_unknown() {
        assert_eq!(tag_name(1), "bytes");
        assert_eq!(tag_name(99), "<unknown>");
    }

    #[test]
    fn test_nop_iterator_contract() {
        let mut it = NopIterator;
        assert!(!it.next());
        assert!(!it.seek(0));
        assert!(!it.seek(Timestamp::MIN));
        assert!(!it.seek(Timestamp::MAX));
        let (ts, value) = it.at();
        assert_eq!(ts, Timestamp::MIN);
        assert!(value.is_empty());
        assert!(it.err().is_none());
    }
}
