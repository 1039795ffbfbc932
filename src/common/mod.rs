use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod encoding;

/// Milliseconds since the UNIX epoch.
pub type Timestamp = i64;

/// One stored profile observation: a timestamp plus an opaque serialized
/// payload. The storage layer never interprets the payload bytes.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: Vec<u8>,
}

impl Sample {
    pub fn new(timestamp: Timestamp, value: impl Into<Vec<u8>>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }
}

/// Inclusive `[start, end]` time interval.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Whether `[min, max]` intersects this range.
    pub fn overlaps(&self, min: Timestamp, max: Timestamp) -> bool {
        min <= self.end && max >= self.start
    }
}

/// Cooperative cancellation handle shared between a query and its in-flight
/// source fetches. Checked at well-defined checkpoints, never preemptive.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_overlaps() {
        let range = TimeRange::new(10, 20);
        assert!(range.overlaps(5, 10));
        assert!(range.overlaps(20, 30));
        assert!(range.overlaps(12, 18));
        assert!(range.overlaps(5, 30));
        assert!(!range.overlaps(0, 9));
        assert!(!range.overlaps(21, 30));
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_canceled());
        token.cancel();
        assert!(clone.is_canceled());
    }
}
