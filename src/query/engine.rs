use crate::chunks::{Chunk, ChunkIterator, ProfileChunk};
use crate::common::{Sample, TimeRange};
use crate::error::{StoreError, StoreResult};
use crate::labels::{parse_selector, Labels, Matchers};
use crate::query::fanout::fetch_all;
use crate::query::{
    MergeReport, QueryMode, QueryOutcome, QueryParams, QueryReply, SampleMerger, SeriesResult,
    DEFAULT_QUERY_DEADLINE,
};
use crate::store::{SeriesSource, StoredChunk};
use ahash::AHashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Answers label-matcher queries against one or more series sources, merging
/// overlapping series across sources under a cooperative deadline.
///
/// Truncation (deadline or series limit) is communicated through warnings and
/// never fails the query; hard errors are reserved for invalid input and
/// unrecoverable source failures.
pub struct MergeEngine {
    sources: Vec<Arc<dyn SeriesSource>>,
    deadline: Duration,
}

/// One series identity after cross-source grouping.
struct GatheredSeries {
    labels: Labels,
    chunks: Vec<StoredChunk>,
}

impl MergeEngine {
    pub fn new(sources: Vec<Arc<dyn SeriesSource>>) -> Self {
        Self {
            sources,
            deadline: DEFAULT_QUERY_DEADLINE,
        }
    }

    /// Replaces the default per-query wall-clock budget.
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Mode-dispatching entry point for the boundary layer. The merger is
    /// only consulted in merge mode.
    pub fn execute(
        &self,
        mode: QueryMode,
        params: &QueryParams,
        merger: &mut dyn SampleMerger,
    ) -> StoreResult<QueryReply> {
        match mode {
            QueryMode::Instant => self.query_instant(params).map(QueryReply::Series),
            QueryMode::Range => self.query_range(params).map(QueryReply::Series),
            QueryMode::Merge => self.merge(params, merger).map(QueryReply::Merged),
        }
    }

    /// Per matching series, the nearest sample at or before `range.end`.
    pub fn query_instant(&self, params: &QueryParams) -> StoreResult<QueryOutcome> {
        self.select(params, true)
    }

    /// Per matching series, all samples within the range. Series present in
    /// several sources are deduplicated by identity; equal timestamps
    /// collapse to one sample.
    pub fn query_range(&self, params: &QueryParams) -> StoreResult<QueryOutcome> {
        self.select(params, false)
    }

    /// Folds every sample of every matching series in the range into the
    /// caller's merger. Series are processed in a fixed, deterministic order,
    /// with the deadline checked at each series boundary, so a truncation
    /// point is reproducible for a given store state.
    pub fn merge(
        &self,
        params: &QueryParams,
        merger: &mut dyn SampleMerger,
    ) -> StoreResult<MergeReport> {
        let (matchers, deadline) = self.prepare(params)?;
        let (series, errors, fetch_timed_out) =
            self.gather(&matchers, params.range, deadline, params);

        let mut report = MergeReport::default();
        let mut included = 0usize;
        let mut timeout_warned = false;

        for gathered in &series {
            if Instant::now() >= deadline {
                params.cancel.cancel();
                report.warnings.push(merge_timeout_warning(report.samples_merged));
                timeout_warned = true;
                break;
            }
            let samples = collect_series_samples(gathered, params.range);
            if samples.is_empty() {
                continue;
            }
            if let Some(limit) = params.limit {
                if included >= limit {
                    report.warnings.push(limit_warning(limit));
                    break;
                }
            }
            for sample in &samples {
                merger.merge(sample.timestamp, &sample.value)?;
                report.samples_merged += 1;
            }
            included += 1;
        }

        if fetch_timed_out && !timeout_warned {
            report.warnings.push(merge_timeout_warning(report.samples_merged));
        }

        if !errors.is_empty() {
            if report.samples_merged > 0 {
                for err in &errors {
                    log::warn!("series source failed during merge: {err}");
                    report
                        .warnings
                        .push(format!("series source failed during merge: {err}"));
                }
            } else {
                let mut errors = errors;
                return Err(errors.remove(0));
            }
        }
        Ok(report)
    }

    fn select(&self, params: &QueryParams, instant: bool) -> StoreResult<QueryOutcome> {
        let (matchers, deadline) = self.prepare(params)?;
        let (series, errors, fetch_timed_out) =
            self.gather(&matchers, params.range, deadline, params);
        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }

        let mut outcome = QueryOutcome::default();
        let mut timeout_warned = false;
        for gathered in &series {
            if Instant::now() >= deadline {
                params.cancel.cancel();
                outcome.warnings.push(select_timeout_warning(outcome.series.len()));
                timeout_warned = true;
                break;
            }
            let mut samples = collect_series_samples(gathered, params.range);
            if instant {
                // nearest-below: keep only the latest sample in range
                samples = samples.pop().into_iter().collect();
            }
            if samples.is_empty() {
                continue;
            }
            if let Some(limit) = params.limit {
                if outcome.series.len() >= limit {
                    outcome.warnings.push(limit_warning(limit));
                    break;
                }
            }
            outcome.series.push(SeriesResult {
                labels: gathered.labels.clone(),
                samples,
            });
        }
        if fetch_timed_out && !timeout_warned {
            outcome.warnings.push(select_timeout_warning(outcome.series.len()));
        }
        Ok(outcome)
    }

    /// Validates the query and computes its deadline. Fails fast without
    /// touching any source.
    fn prepare(&self, params: &QueryParams) -> StoreResult<(Matchers, Instant)> {
        if params.cancel.is_canceled() {
            return Err(StoreError::Canceled);
        }
        if params.range.start > params.range.end {
            return Err(StoreError::InvalidQuery(format!(
                "time range start ({}) is after end ({})",
                params.range.start, params.range.end
            )));
        }
        let matchers = parse_selector(&params.selector)?;
        let deadline = Instant::now() + params.deadline.unwrap_or(self.deadline);
        Ok((matchers, deadline))
    }

    /// Fans out to every source and groups the responses by series identity.
    /// Returns the grouped series in deterministic order, the hard source
    /// errors, and whether the fetch phase itself hit the deadline.
    fn gather(
        &self,
        matchers: &Matchers,
        range: TimeRange,
        deadline: Instant,
        params: &QueryParams,
    ) -> (Vec<GatheredSeries>, Vec<StoreError>, bool) {
        let fetches = fetch_all(&self.sources, matchers, range, &params.cancel, deadline);
        let timed_out = fetches.len() < self.sources.len();

        let mut by_signature: AHashMap<u64, GatheredSeries> = AHashMap::new();
        let mut errors = Vec::new();
        for fetch in fetches {
            match fetch.result {
                Ok(list) => {
                    for series_chunks in list {
                        let entry = by_signature
                            .entry(series_chunks.labels.signature())
                            .or_insert_with(|| GatheredSeries {
                                labels: series_chunks.labels.clone(),
                                chunks: Vec::new(),
                            });
                        entry.chunks.extend(series_chunks.chunks);
                    }
                }
                // canceled fetches were stopped by our own deadline, which is
                // reported as a timeout, not a source failure
                Err(StoreError::Canceled) => {}
                Err(err) => errors.push(err),
            }
        }

        let mut series: Vec<GatheredSeries> = by_signature.into_values().collect();
        for gathered in &mut series {
            gathered.chunks.sort_by_key(|chunk| chunk.min_time);
        }
        series.sort_by(|a, b| a.labels.cmp(&b.labels));
        (series, errors, timed_out)
    }
}

fn merge_timeout_warning(samples_merged: usize) -> String {
    format!("merge timeout exceeded, used partial merge of {samples_merged} samples")
}

fn select_timeout_warning(series_returned: usize) -> String {
    format!("query timeout exceeded, returning partial result of {series_returned} series")
}

fn limit_warning(limit: usize) -> String {
    format!("retrieved {limit} series, more available")
}

/// Decodes one gathered series into range-filtered samples in timestamp
/// order.
///
/// An identical `(timestamp, payload)` pair is the same sample served by more
/// than one source and collapses to one occurrence; distinct payloads sharing
/// a timestamp are separate samples and all survive. A chunk decode fault
/// keeps the samples read before the fault and drops the remainder of that
/// chunk, with a logged warning; this policy applies uniformly across query
/// modes.
fn collect_series_samples(series: &GatheredSeries, range: TimeRange) -> Vec<Sample> {
    let mut samples: Vec<Sample> = Vec::new();
    for stored in &series.chunks {
        let chunk = match ProfileChunk::from_tagged(stored.encoding, &stored.data) {
            Ok(chunk) => chunk,
            Err(err) => {
                log::warn!("skipping unreadable chunk for {}: {err}", series.labels);
                continue;
            }
        };
        let mut it = chunk.iterator();
        if !it.seek(range.start) {
            if let Some(err) = it.err() {
                log::warn!("decode fault in chunk for {}: {err}", series.labels);
            }
            continue;
        }
        loop {
            let (ts, value) = it.at();
            if ts > range.end {
                break;
            }
            samples.push(Sample::new(ts, value));
            if !it.next() {
                if let Some(err) = it.err() {
                    log::warn!(
                        "decode fault in chunk for {}, keeping {} samples read before it: {err}",
                        series.labels,
                        samples.len()
                    );
                }
                break;
            }
        }
    }
    samples.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.value.cmp(&b.value))
    });
    samples.dedup_by(|a, b| a.timestamp == b.timestamp && a.value == b.value);
    samples
}
