use crate::common::{CancelToken, TimeRange, Timestamp};
use crate::error::StoreResult;
use crate::labels::{Labels, Matchers};

mod memory;

pub use memory::*;

/// One stored chunk as handed over by a series source: covered time range,
/// encoding tag, and the serialized buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredChunk {
    pub min_time: Timestamp,
    pub max_time: Timestamp,
    pub encoding: u8,
    pub data: Vec<u8>,
}

/// All chunks one source holds for a single series within a queried range,
/// ordered by minimum timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesChunks {
    pub labels: Labels,
    pub chunks: Vec<StoredChunk>,
}

/// A local database or remote client that resolves series for a query.
pub trait SeriesSource: Send + Sync {
    /// Resolves the series whose labels match `matchers` and whose stored
    /// time range intersects `range`.
    ///
    /// When `cancel` is already set the source must return
    /// [`crate::StoreError::Canceled`] immediately without doing any work,
    /// and long-running implementations should re-check it between steps.
    fn series(
        &self,
        matchers: &Matchers,
        range: TimeRange,
        cancel: &CancelToken,
    ) -> StoreResult<Vec<SeriesChunks>>;
}

/// Ingestion half of the profile store contract.
pub trait ProfileWriter {
    fn write(&self, labels: Labels, timestamp: Timestamp, value: &[u8]) -> StoreResult<()>;
}

/// Label index lookups over stored series.
pub trait LabelIndex {
    /// Sorted, distinct label names across series intersecting `range`.
    fn label_names(&self, range: TimeRange) -> StoreResult<Vec<String>>;

    /// Sorted, distinct values of `name` across series that match `matchers`
    /// and intersect `range`.
    fn label_values(
        &self,
        name: &str,
        matchers: &Matchers,
        range: TimeRange,
    ) -> StoreResult<Vec<String>>;
}
