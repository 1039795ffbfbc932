use crate::chunks::chunk::{Chunk, ChunkEncoding, ChunkIterator};
use crate::common::encoding::{read_signed_varint, read_uvarint, write_signed_varint, write_uvarint};
use crate::common::Timestamp;
use crate::error::{StoreError, StoreResult};

/// Two bytes, big-endian sample count.
const HEADER_SIZE: usize = 2;

/// The count header caps a single chunk; the head-cutting policy in the store
/// keeps real chunks far below this.
pub const MAX_CHUNK_SAMPLES: usize = u16::MAX as usize;

/// Varint-framed chunk of opaque profile payloads, the one active encoding.
///
/// Buffer layout after the count header, per sample: a zigzag varint
/// timestamp (absolute for the first sample, delta against the previous one
/// after that), a uvarint payload length, and the payload bytes, in append
/// order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BytesChunk {
    buf: Vec<u8>,
    // cached tail timestamp; None until the first append, or after a load
    // from bytes (recomputed by scanning when needed)
    last_ts: Option<Timestamp>,
}

// the empty chunk still carries its count header
impl Default for BytesChunk {
    fn default() -> Self {
        Self::new()
    }
}

impl BytesChunk {
    pub fn new() -> Self {
        Self {
            buf: vec![0; HEADER_SIZE],
            last_ts: None,
        }
    }

    /// Wraps a serialized chunk produced by [`Chunk::bytes`]. The record
    /// stream is validated lazily, during iteration.
    pub fn from_bytes(buf: Vec<u8>) -> StoreResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(StoreError::ChunkDecoding);
        }
        Ok(Self { buf, last_ts: None })
    }

    fn count(&self) -> usize {
        u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize
    }

    fn set_count(&mut self, n: usize) {
        let bytes = (n as u16).to_be_bytes();
        self.buf[0] = bytes[0];
        self.buf[1] = bytes[1];
    }

    /// Returns the chunk to the pristine empty state so its buffer can be
    /// handed out again.
    pub(crate) fn reset(&mut self) {
        self.buf.clear();
        self.buf.resize(HEADER_SIZE, 0);
        self.last_ts = None;
    }

    /// Timestamp of the most recently appended sample. Scans the buffer once
    /// when the chunk was loaded from bytes.
    fn tail_timestamp(&self) -> StoreResult<Option<Timestamp>> {
        if let Some(ts) = self.last_ts {
            return Ok(Some(ts));
        }
        if self.count() == 0 {
            return Ok(None);
        }
        let mut it = BytesChunkIterator::new(&self.buf);
        let mut last = None;
        while it.next() {
            last = Some(it.at().0);
        }
        if let Some(err) = it.err() {
            return Err(err.clone());
        }
        Ok(last)
    }
}

impl Chunk for BytesChunk {
    fn encoding(&self) -> ChunkEncoding {
        ChunkEncoding::Bytes
    }

    fn append(&mut self, timestamp: Timestamp, value: &[u8]) {
        let prev = match self.tail_timestamp() {
            Ok(prev) => prev,
            Err(_) => {
                // a corrupt loaded chunk takes no further appends; iteration
                // surfaces the fault to the reader
                log::warn!("append to corrupt bytes chunk dropped");
                return;
            }
        };
        let n = self.count();
        if n >= MAX_CHUNK_SAMPLES {
            log::warn!("bytes chunk at sample capacity {MAX_CHUNK_SAMPLES}, append dropped");
            return;
        }
        match prev {
            None => write_signed_varint(&mut self.buf, timestamp),
            Some(prev) => write_signed_varint(&mut self.buf, timestamp - prev),
        }
        write_uvarint(&mut self.buf, value.len() as u64);
        self.buf.extend_from_slice(value);
        self.last_ts = Some(timestamp);
        self.set_count(n + 1);
    }

    fn iterator(&self) -> Box<dyn ChunkIterator + '_> {
        Box::new(BytesChunkIterator::new(&self.buf))
    }

    fn bytes(&self) -> StoreResult<Vec<u8>> {
        if self.buf.len() < HEADER_SIZE {
            return Err(StoreError::ChunkEncoding);
        }
        Ok(self.buf.clone())
    }

    fn num_samples(&self) -> usize {
        self.count()
    }

    fn compact(&mut self) {
        self.buf.shrink_to_fit();
    }
}

/// Decoding cursor over a [`BytesChunk`] buffer.
pub struct BytesChunkIterator<'a> {
    data: &'a [u8],
    offset: usize,
    read: usize,
    total: usize,
    ts: Timestamp,
    // current payload position, as (offset, len) into `data`
    value: (usize, usize),
    started: bool,
    done: bool,
    err: Option<StoreError>,
}

impl<'a> BytesChunkIterator<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        let (total, err) = if data.len() >= HEADER_SIZE {
            (u16::from_be_bytes([data[0], data[1]]) as usize, None)
        } else {
            (0, Some(StoreError::ChunkDecoding))
        };
        Self {
            data,
            offset: HEADER_SIZE.min(data.len()),
            read: 0,
            total,
            ts: 0,
            value: (0, 0),
            started: false,
            done: false,
            err,
        }
    }

    fn fail(&mut self) -> bool {
        self.err = Some(StoreError::ChunkDecoding);
        self.done = true;
        false
    }
}

impl ChunkIterator for BytesChunkIterator<'_> {
    fn next(&mut self) -> bool {
        if self.err.is_some() || self.done {
            return false;
        }
        if self.read >= self.total {
            self.done = true;
            return false;
        }
        let Some((delta, n)) = read_signed_varint(self.data, self.offset) else {
            return self.fail();
        };
        let mut pos = self.offset + n;
        let Some((len, n)) = read_uvarint(self.data, pos) else {
            return self.fail();
        };
        pos += n;
        let len = len as usize;
        if len > self.data.len() || pos + len > self.data.len() {
            return self.fail();
        }
        self.ts = if self.started { self.ts + delta } else { delta };
        self.value = (pos, len);
        self.offset = pos + len;
        self.read += 1;
        self.started = true;
        true
    }

    fn seek(&mut self, t: Timestamp) -> bool {
        if self.err.is_some() || self.done {
            return false;
        }
        if self.started && self.ts >= t {
            return true;
        }
        while self.next() {
            if self.ts >= t {
                return true;
            }
        }
        false
    }

    fn at(&self) -> (Timestamp, &[u8]) {
        let (offset, len) = self.value;
        (self.ts, &self.data[offset..offset + len])
    }

    fn err(&self) -> Option<&StoreError> {
        self.err.as_ref()
    }
}
