use crate::common::{CancelToken, Sample, TimeRange, Timestamp};
use crate::error::{StoreError, StoreResult};
use crate::labels::Labels;
use std::time::Duration;

mod engine;
mod fanout;

pub use engine::*;

/// Wall-clock budget applied when a query carries no deadline override.
pub const DEFAULT_QUERY_DEADLINE: Duration = Duration::from_secs(10);

/// How a query consumes the matching series.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryMode {
    /// Nearest sample at or before the requested instant, per series.
    Instant,
    /// All samples in the range, per series.
    Range,
    /// All samples in the range folded into one aggregate.
    Merge,
}

/// A single query. Transient: constructed per request, never persisted.
#[derive(Clone, Debug)]
pub struct QueryParams {
    pub selector: String,
    pub range: TimeRange,
    /// Cap on the number of series included in the result.
    pub limit: Option<usize>,
    /// Per-query deadline override.
    pub deadline: Option<Duration>,
    /// Caller-side cancellation, e.g. on client disconnect.
    pub cancel: CancelToken,
}

impl QueryParams {
    pub fn new(selector: impl Into<String>, range: TimeRange) -> Self {
        Self {
            selector: selector.into(),
            range,
            limit: None,
            deadline: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Parses boundary-supplied `from`/`to` values. Anything missing, non-numeric
/// or inverted fails fast with a bad-request error; no partial work happens
/// afterwards.
pub fn parse_time_range(from: Option<&str>, to: Option<&str>) -> StoreResult<TimeRange> {
    let from = parse_time_bound("from", from)?;
    let to = parse_time_bound("to", to)?;
    if from > to {
        return Err(StoreError::InvalidQuery(format!(
            "from ({from}) must not be after to ({to})"
        )));
    }
    Ok(TimeRange::new(from, to))
}

fn parse_time_bound(name: &str, value: Option<&str>) -> StoreResult<Timestamp> {
    let raw = value.ok_or_else(|| {
        StoreError::InvalidQuery(format!("missing required parameter {name:?}"))
    })?;
    raw.trim().parse().map_err(|_| {
        StoreError::InvalidQuery(format!("parameter {name:?} is not a valid timestamp: {raw:?}"))
    })
}

/// Samples actually returned for one matching series.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesResult {
    pub labels: Labels,
    pub samples: Vec<Sample>,
}

/// Result of an instant or range query. Warnings carry truncation notices;
/// a truncated query is still a successful query.
#[derive(Clone, Debug, Default)]
pub struct QueryOutcome {
    pub series: Vec<SeriesResult>,
    pub warnings: Vec<String>,
}

/// Result of a merge query: how many samples reached the merger, plus any
/// truncation or degradation warnings.
#[derive(Clone, Debug, Default)]
pub struct MergeReport {
    pub samples_merged: usize,
    pub warnings: Vec<String>,
}

/// Folds opaque profile payloads into one aggregate.
///
/// Deadline or limit truncation can cut the sample stream at any point, so
/// the fold must be commutative and associative over payloads.
pub trait SampleMerger {
    fn merge(&mut self, timestamp: Timestamp, value: &[u8]) -> StoreResult<()>;
}

/// Reference merger that concatenates payloads. Real callers plug in a
/// profile-format-aware implementation.
#[derive(Debug, Default)]
pub struct ConcatMerger {
    pub data: Vec<u8>,
}

impl SampleMerger for ConcatMerger {
    fn merge(&mut self, _timestamp: Timestamp, value: &[u8]) -> StoreResult<()> {
        self.data.extend_from_slice(value);
        Ok(())
    }
}

/// Reply of the mode-dispatching query entry point.
#[derive(Debug)]
pub enum QueryReply {
    Series(QueryOutcome),
    Merged(MergeReport),
}
