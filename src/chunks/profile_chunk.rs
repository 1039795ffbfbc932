use crate::chunks::bytes_chunk::BytesChunk;
use crate::chunks::chunk::{Chunk, ChunkEncoding, ChunkIterator};
use crate::common::Timestamp;
use crate::error::{StoreError, StoreResult};

/// Concrete chunk dispatch over the supported encodings.
///
/// Call sites program against [`Chunk`] and this enum; adding an encoding
/// means adding a variant here plus its arms, with no caller changes.
#[derive(Clone, Debug, PartialEq)]
pub enum ProfileChunk {
    Bytes(BytesChunk),
}

impl ProfileChunk {
    /// Creates a fresh mutable chunk of the given encoding.
    pub fn new(encoding: ChunkEncoding) -> StoreResult<Self> {
        match encoding {
            ChunkEncoding::Bytes => Ok(ProfileChunk::Bytes(BytesChunk::new())),
            ChunkEncoding::Xor => panic!("nothing should be using XOR encoding"),
            other => Err(StoreError::UnsupportedEncoding(other.tag())),
        }
    }

    /// Materializes a chunk from serialized data.
    pub fn from_data(encoding: ChunkEncoding, data: &[u8]) -> StoreResult<Self> {
        match encoding {
            ChunkEncoding::Bytes => Ok(ProfileChunk::Bytes(BytesChunk::from_bytes(data.to_vec())?)),
            ChunkEncoding::Xor => panic!("nothing should be using XOR encoding"),
            other => Err(StoreError::UnsupportedEncoding(other.tag())),
        }
    }

    /// [`ProfileChunk::from_data`] for a raw tag, as stored by series sources.
    /// Unknown tags are a recoverable error, never a crash.
    pub fn from_tagged(tag: u8, data: &[u8]) -> StoreResult<Self> {
        match ChunkEncoding::from_tag(tag) {
            Some(encoding) => Self::from_data(encoding, data),
            None => Err(StoreError::UnsupportedEncoding(tag)),
        }
    }
}

impl Chunk for ProfileChunk {
    fn encoding(&self) -> ChunkEncoding {
        match self {
            ProfileChunk::Bytes(chunk) => chunk.encoding(),
        }
    }

    fn append(&mut self, timestamp: Timestamp, value: &[u8]) {
        match self {
            ProfileChunk::Bytes(chunk) => chunk.append(timestamp, value),
        }
    }

    fn iterator(&self) -> Box<dyn ChunkIterator + '_> {
        match self {
            ProfileChunk::Bytes(chunk) => chunk.iterator(),
        }
    }

    fn bytes(&self) -> StoreResult<Vec<u8>> {
        match self {
            ProfileChunk::Bytes(chunk) => chunk.bytes(),
        }
    }

    fn num_samples(&self) -> usize {
        match self {
            ProfileChunk::Bytes(chunk) => chunk.num_samples(),
        }
    }

    fn compact(&mut self) {
        match self {
            ProfileChunk::Bytes(chunk) => chunk.compact(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unsupported_encoding() {
        assert_eq!(
            ProfileChunk::new(ChunkEncoding::Timestamps),
            Err(StoreError::UnsupportedEncoding(2))
        );
        assert_eq!(
            ProfileChunk::new(ChunkEncoding::Values),
            Err(StoreError::UnsupportedEncoding(3))
        );
    }

    #[test]
    #[should_panic(expected = "nothing should be using XOR encoding")]
    fn test_xor_encoding_is_fatal() {
        let _ = ProfileChunk::new(ChunkEncoding::Xor);
    }

    #[test]
    fn test_from_tagged_unknown() {
        assert_eq!(
            ProfileChunk::from_tagged(77, &[0, 0]),
            Err(StoreError::UnsupportedEncoding(77))
        );
    }

    #[test]
    fn test_round_trip_through_tag() {
        let mut chunk = ProfileChunk::new(ChunkEncoding::Bytes).unwrap();
        chunk.append(5, b"payload");
        let data = chunk.bytes().unwrap();

        let reloaded = ProfileChunk::from_tagged(chunk.encoding().tag(), &data).unwrap();
        assert_eq!(reloaded.num_samples(), 1);
        let mut it = reloaded.iterator();
        assert!(it.next());
        assert_eq!(it.at(), (5, b"payload".as_slice()));
    }
}
