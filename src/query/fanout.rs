use crate::common::{CancelToken, TimeRange};
use crate::error::StoreResult;
use crate::labels::Matchers;
use crate::store::{SeriesChunks, SeriesSource};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

pub(crate) struct SourceFetch {
    pub source_index: usize,
    pub result: StoreResult<Vec<SeriesChunks>>,
}

/// Issues one fetch per source on its own thread and gathers results until
/// every source reported or the deadline passed.
///
/// Concurrency is bounded by the number of configured sources. On timeout the
/// cancel token is set so in-flight fetches stop at their next checkpoint;
/// whatever they produce afterwards is dropped along with the channel. The
/// returned fetches are ordered by source index so downstream processing is
/// deterministic.
pub(crate) fn fetch_all(
    sources: &[Arc<dyn SeriesSource>],
    matchers: &Matchers,
    range: TimeRange,
    cancel: &CancelToken,
    deadline: Instant,
) -> Vec<SourceFetch> {
    let (tx, rx) = mpsc::channel();
    for (source_index, source) in sources.iter().enumerate() {
        let tx = tx.clone();
        let source = Arc::clone(source);
        let matchers = matchers.clone();
        let cancel = cancel.clone();
        thread::spawn(move || {
            let result = source.series(&matchers, range, &cancel);
            // the receiver may already be gone after a timeout
            let _ = tx.send(SourceFetch {
                source_index,
                result,
            });
        });
    }
    drop(tx);

    let mut fetches = Vec::with_capacity(sources.len());
    while fetches.len() < sources.len() {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(timeout) {
            Ok(fetch) => fetches.push(fetch),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!(
                    "query deadline hit while waiting on {} of {} series sources",
                    sources.len() - fetches.len(),
                    sources.len()
                );
                cancel.cancel();
                break;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    fetches.sort_by_key(|fetch| fetch.source_index);
    fetches
}
