use crate::chunks::{Chunk, ChunkEncoding, ChunkPool, ProfileChunk};
use crate::common::{CancelToken, TimeRange, Timestamp};
use crate::error::{StoreError, StoreResult};
use crate::labels::{Labels, Matchers};
use crate::store::{LabelIndex, ProfileWriter, SeriesChunks, SeriesSource, StoredChunk};
use ahash::{AHashMap, AHashSet};
use std::sync::RwLock;

/// Samples per head chunk before it is sealed and a fresh chunk is cut.
pub const HEAD_CHUNK_SAMPLES: usize = 120;

struct SeriesEntry {
    labels: Labels,
    // sealed chunks are immutable and kept serialized
    sealed: Vec<StoredChunk>,
    head: ProfileChunk,
    head_min: Timestamp,
    head_max: Timestamp,
}

impl SeriesEntry {
    fn new(labels: Labels, head: ProfileChunk) -> Self {
        Self {
            labels,
            sealed: Vec::new(),
            head,
            head_min: Timestamp::MAX,
            head_max: Timestamp::MIN,
        }
    }

    fn overlaps(&self, range: TimeRange) -> bool {
        if self.head.num_samples() > 0 && range.overlaps(self.head_min, self.head_max) {
            return true;
        }
        self.sealed
            .iter()
            .any(|chunk| range.overlaps(chunk.min_time, chunk.max_time))
    }
}

/// In-memory readable/writable profile store. Serves as the local series
/// source and as the reference implementation of the storage contract.
pub struct MemoryProfileStore {
    series: RwLock<AHashMap<u64, SeriesEntry>>,
    pool: ChunkPool,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            series: RwLock::new(AHashMap::new()),
            pool: ChunkPool::new(),
        }
    }

    pub fn series_count(&self) -> usize {
        self.series.read().unwrap().len()
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileWriter for MemoryProfileStore {
    fn write(&self, labels: Labels, timestamp: Timestamp, value: &[u8]) -> StoreResult<()> {
        if labels.is_empty() {
            return Err(StoreError::InvalidQuery(
                "series must carry at least one label".into(),
            ));
        }

        let signature = labels.signature();
        let mut series = self.series.write().unwrap();
        if !series.contains_key(&signature) {
            let head = self.pool.get(ChunkEncoding::Bytes, &[])?;
            series.insert(signature, SeriesEntry::new(labels, head));
        }
        let entry = match series.get_mut(&signature) {
            Some(entry) => entry,
            None => return Err(StoreError::General("series map lookup failed".into())),
        };

        if entry.head.num_samples() > 0 && timestamp < entry.head_max {
            return Err(StoreError::OutOfOrderSample);
        }
        if let Some(last_sealed) = entry.sealed.last() {
            if timestamp < last_sealed.max_time {
                return Err(StoreError::OutOfOrderSample);
            }
        }

        entry.head.append(timestamp, value);
        entry.head_min = entry.head_min.min(timestamp);
        entry.head_max = entry.head_max.max(timestamp);

        if entry.head.num_samples() >= HEAD_CHUNK_SAMPLES {
            let fresh = self.pool.get(ChunkEncoding::Bytes, &[])?;
            let mut full = std::mem::replace(&mut entry.head, fresh);
            full.compact();
            let data = full.bytes()?;
            log::debug!(
                "sealing chunk for {} with {} samples",
                entry.labels,
                full.num_samples()
            );
            entry.sealed.push(StoredChunk {
                min_time: entry.head_min,
                max_time: entry.head_max,
                encoding: full.encoding().tag(),
                data,
            });
            self.pool.put(full)?;
            entry.head_min = Timestamp::MAX;
            entry.head_max = Timestamp::MIN;
        }
        Ok(())
    }
}

impl SeriesSource for MemoryProfileStore {
    fn series(
        &self,
        matchers: &Matchers,
        range: TimeRange,
        cancel: &CancelToken,
    ) -> StoreResult<Vec<SeriesChunks>> {
        if cancel.is_canceled() {
            return Err(StoreError::Canceled);
        }

        let series = self.series.read().unwrap();
        let mut out = Vec::new();
        for entry in series.values() {
            if !matchers.matches(&entry.labels) || !entry.overlaps(range) {
                continue;
            }

            let mut chunks: Vec<StoredChunk> = entry
                .sealed
                .iter()
                .filter(|chunk| range.overlaps(chunk.min_time, chunk.max_time))
                .cloned()
                .collect();

            if entry.head.num_samples() > 0 && range.overlaps(entry.head_min, entry.head_max) {
                chunks.push(StoredChunk {
                    min_time: entry.head_min,
                    max_time: entry.head_max,
                    encoding: entry.head.encoding().tag(),
                    data: entry.head.bytes()?,
                });
            }
            if chunks.is_empty() {
                continue;
            }
            out.push(SeriesChunks {
                labels: entry.labels.clone(),
                chunks,
            });
        }
        // fixed resolution order keeps query results reproducible
        out.sort_by(|a, b| a.labels.cmp(&b.labels));
        Ok(out)
    }
}

impl LabelIndex for MemoryProfileStore {
    fn label_names(&self, range: TimeRange) -> StoreResult<Vec<String>> {
        let series = self.series.read().unwrap();
        let mut names = AHashSet::new();
        for entry in series.values() {
            if !entry.overlaps(range) {
                continue;
            }
            for label in entry.labels.iter() {
                names.insert(label.name.clone());
            }
        }
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort();
        Ok(names)
    }

    fn label_values(
        &self,
        name: &str,
        matchers: &Matchers,
        range: TimeRange,
    ) -> StoreResult<Vec<String>> {
        let series = self.series.read().unwrap();
        let mut values = AHashSet::new();
        for entry in series.values() {
            if !matchers.matches(&entry.labels) || !entry.overlaps(range) {
                continue;
            }
            if let Some(value) = entry.labels.get(name) {
                values.insert(value.to_string());
            }
        }
        let mut values: Vec<String> = values.into_iter().collect();
        values.sort();
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::ChunkIterator;
    use crate::chunks::ProfileChunk;
    use crate::labels::parse_selector;

    fn full_range() -> TimeRange {
        TimeRange::new(0, Timestamp::MAX)
    }

    fn decode_all(series: &SeriesChunks) -> Vec<(Timestamp, Vec<u8>)> {
        let mut out = Vec::new();
        for stored in &series.chunks {
            let chunk = ProfileChunk::from_tagged(stored.encoding, &stored.data).unwrap();
            let mut it = chunk.iterator();
            while it.next() {
                let (ts, value) = it.at();
                out.push((ts, value.to_vec()));
            }
            assert!(it.err().is_none());
        }
        out
    }

    #[test]
    fn test_write_and_read_back() {
        let store = MemoryProfileStore::new();
        let labels = Labels::from_pairs([("__name__", "allocs"), ("foo", "bar")]);
        for i in 0..10 {
            store.write(labels.clone(), i * 1000, b"profile").unwrap();
        }

        let matchers = parse_selector("allocs").unwrap();
        let found = store
            .series(&matchers, full_range(), &CancelToken::new())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].labels, labels);
        let samples = decode_all(&found[0]);
        assert_eq!(samples.len(), 10);
        assert_eq!(samples[3], (3000, b"profile".to_vec()));
    }

    #[test]
    fn test_head_chunk_is_sealed_at_capacity() {
        let store = MemoryProfileStore::new();
        let labels = Labels::from_pairs([("__name__", "allocs")]);
        let total = HEAD_CHUNK_SAMPLES + 5;
        for i in 0..total {
            store.write(labels.clone(), i as i64, b"p").unwrap();
        }

        let matchers = parse_selector("allocs").unwrap();
        let found = store
            .series(&matchers, full_range(), &CancelToken::new())
            .unwrap();
        assert_eq!(found.len(), 1);
        // one sealed chunk plus the open head
        assert_eq!(found[0].chunks.len(), 2);
        assert_eq!(found[0].chunks[0].min_time, 0);
        assert_eq!(
            found[0].chunks[0].max_time,
            (HEAD_CHUNK_SAMPLES - 1) as i64
        );
        assert_eq!(decode_all(&found[0]).len(), total);
    }

    #[test]
    fn test_out_of_order_write_rejected() {
        let store = MemoryProfileStore::new();
        let labels = Labels::from_pairs([("__name__", "allocs")]);
        store.write(labels.clone(), 100, b"a").unwrap();
        assert_eq!(
            store.write(labels.clone(), 50, b"b"),
            Err(StoreError::OutOfOrderSample)
        );
        // equal timestamps stay legal
        store.write(labels, 100, b"c").unwrap();
    }

    #[test]
    fn test_empty_labels_rejected() {
        let store = MemoryProfileStore::new();
        assert!(matches!(
            store.write(Labels::default(), 1, b"x"),
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_series_respects_time_range() {
        let store = MemoryProfileStore::new();
        let labels = Labels::from_pairs([("__name__", "allocs")]);
        store.write(labels.clone(), 1000, b"a").unwrap();
        store.write(labels, 2000, b"b").unwrap();

        let matchers = parse_selector("allocs").unwrap();
        let found = store
            .series(&matchers, TimeRange::new(3000, 4000), &CancelToken::new())
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_canceled_context_short_circuits() {
        let store = MemoryProfileStore::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let matchers = parse_selector("allocs").unwrap();
        assert_eq!(
            store.series(&matchers, full_range(), &cancel),
            Err(StoreError::Canceled)
        );
    }

    #[test]
    fn test_label_index_end_to_end() {
        let store = MemoryProfileStore::new();
        let allocs = Labels::from_pairs([("__name__", "allocs"), ("foo", "bar")]);
        let goroutine = Labels::from_pairs([("__name__", "goroutine"), ("foo", "boo")]);
        for i in 0..10 {
            store.write(allocs.clone(), i * 10, b"a").unwrap();
            store.write(goroutine.clone(), i * 10 + 1, b"g").unwrap();
        }
        store
            .write(
                Labels::from_pairs([("__name__", "heap"), ("baz", "qux")]),
                42,
                b"h",
            )
            .unwrap();

        assert_eq!(
            store.label_names(full_range()).unwrap(),
            vec!["__name__", "baz", "foo"]
        );
        assert_eq!(
            store
                .label_values("__name__", &parse_selector(r#"{baz=""}"#).unwrap(), full_range())
                .unwrap(),
            vec!["allocs", "goroutine"]
        );
        assert_eq!(
            store
                .label_values("__name__", &Matchers::default(), full_range())
                .unwrap(),
            vec!["allocs", "goroutine", "heap"]
        );
    }
}
