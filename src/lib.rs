//! Storage and query engine for continuous-profiling samples.
//!
//! A sample is a millisecond timestamp paired with an opaque profile payload
//! (e.g. serialized pprof data). Samples are grouped into series identified
//! by sorted label sets, packed into append-only chunks, and queried back
//! through label matchers with instant, range, and merge modes. Queries fan
//! out over any number of [`store::SeriesSource`] implementations and run
//! under a cooperative deadline that degrades to partial results with
//! warnings instead of failing outright.
//!
//! ```
//! use profiledb::common::TimeRange;
//! use profiledb::labels::Labels;
//! use profiledb::query::{MergeEngine, QueryParams};
//! use profiledb::store::{MemoryProfileStore, ProfileWriter, SeriesSource};
//! use std::sync::Arc;
//!
//! # fn main() -> profiledb::StoreResult<()> {
//! let store = Arc::new(MemoryProfileStore::new());
//! let labels = Labels::from_pairs([("__name__", "allocs"), ("instance", "api-1")]);
//! store.write(labels, 1000, b"pprof payload")?;
//!
//! let engine = MergeEngine::new(vec![store as Arc<dyn SeriesSource>]);
//! let params = QueryParams::new(r#"allocs{instance="api-1"}"#, TimeRange::new(0, 2000));
//! let outcome = engine.query_range(&params)?;
//! assert_eq!(outcome.series.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod chunks;
pub mod common;
pub mod labels;
pub mod query;
pub mod store;

mod error;

pub use error::{StoreError, StoreResult};
