use crate::chunks::bytes_chunk::BytesChunk;
use crate::chunks::chunk::ChunkEncoding;
use crate::chunks::profile_chunk::ProfileChunk;
use crate::error::{StoreError, StoreResult};
use std::sync::Mutex;

/// Recycles chunk buffers per encoding so hot read/write paths do not pay a
/// fresh allocation for every chunk.
///
/// Ownership transfers on `get`/`put` are enforced by move semantics: a chunk
/// handed back with [`ChunkPool::put`] is consumed, so no stale handle can
/// observe the recycled buffer. `get` never hands the same buffer to two
/// callers because the free list pops under its mutex.
#[derive(Debug, Default)]
pub struct ChunkPool {
    bytes: Mutex<Vec<BytesChunk>>,
}

impl ChunkPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a chunk of the requested encoding: loaded from `data` when it
    /// is non-empty, otherwise a reset chunk off the free list (or a fresh
    /// one when the list is empty).
    pub fn get(&self, encoding: ChunkEncoding, data: &[u8]) -> StoreResult<ProfileChunk> {
        match encoding {
            ChunkEncoding::Xor => panic!("nothing should be using XOR encoding"),
            ChunkEncoding::Bytes => {
                if data.is_empty() {
                    let recycled = self.bytes.lock().unwrap().pop();
                    Ok(ProfileChunk::Bytes(recycled.unwrap_or_default()))
                } else {
                    Ok(ProfileChunk::Bytes(BytesChunk::from_bytes(data.to_vec())?))
                }
            }
            other => Err(StoreError::UnsupportedEncoding(other.tag())),
        }
    }

    /// Returns a chunk's buffer to the pool for later reuse. The chunk is
    /// reset before it becomes eligible for another `get`.
    pub fn put(&self, chunk: ProfileChunk) -> StoreResult<()> {
        match chunk {
            ProfileChunk::Bytes(mut chunk) => {
                chunk.reset();
                self.bytes.lock().unwrap().push(chunk);
                Ok(())
            }
        }
    }

    #[cfg(test)]
    fn idle(&self) -> usize {
        self.bytes.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::{Chunk, ChunkIterator};
    use std::sync::Arc;

    #[test]
    fn test_get_fresh_and_recycled() {
        let pool = ChunkPool::new();
        let mut chunk = pool.get(ChunkEncoding::Bytes, &[]).unwrap();
        assert_eq!(chunk.num_samples(), 0);
        chunk.append(1, b"x");

        pool.put(chunk).unwrap();
        assert_eq!(pool.idle(), 1);

        // recycled chunks come back reset
        let recycled = pool.get(ChunkEncoding::Bytes, &[]).unwrap();
        assert_eq!(recycled.num_samples(), 0);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_get_load_path() {
        let pool = ChunkPool::new();
        let mut chunk = pool.get(ChunkEncoding::Bytes, &[]).unwrap();
        chunk.append(10, b"sample");
        let data = chunk.bytes().unwrap();

        let loaded = pool.get(ChunkEncoding::Bytes, &data).unwrap();
        assert_eq!(loaded.num_samples(), 1);
        let mut it = loaded.iterator();
        assert!(it.next());
        assert_eq!(it.at(), (10, b"sample".as_slice()));
    }

    #[test]
    fn test_get_unsupported_encoding() {
        let pool = ChunkPool::new();
        assert_eq!(
            pool.get(ChunkEncoding::Timestamps, &[]).unwrap_err(),
            StoreError::UnsupportedEncoding(2)
        );
        assert_eq!(
            pool.get(ChunkEncoding::None, &[]).unwrap_err(),
            StoreError::UnsupportedEncoding(0)
        );
    }

    #[test]
    #[should_panic(expected = "nothing should be using XOR encoding")]
    fn test_get_disabled_encoding_panics() {
        let pool = ChunkPool::new();
        let _ = pool.get(ChunkEncoding::Xor, &[]);
    }

    // No two concurrent callers may ever observe the same live buffer. Every
    // thread stamps its chunk with its own samples and verifies nobody else's
    // writes show through.
    #[test]
    fn test_concurrent_get_put_isolation() {
        let pool = Arc::new(ChunkPool::new());
        let mut handles = Vec::new();
        for worker in 0u8..8 {
            let pool = Arc::clone(&pool);
            handles.push(std::thread::spawn(move || {
                for round in 0..100u32 {
                    let mut chunk = pool.get(ChunkEncoding::Bytes, &[]).unwrap();
                    assert_eq!(chunk.num_samples(), 0, "received a non-reset chunk");
                    let stamp = vec![worker; 16];
                    for i in 0..4 {
                        chunk.append((round as i64) * 10 + i, &stamp);
                    }
                    assert_eq!(chunk.num_samples(), 4);
                    {
                        let mut it = chunk.iterator();
                        while it.next() {
                            assert_eq!(
                                it.at().1,
                                stamp.as_slice(),
                                "buffer shared with another worker"
                            );
                        }
                    }
                    pool.put(chunk).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.idle() <= 8);
    }
}
