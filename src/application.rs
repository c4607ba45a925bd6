//! Application layer module
//!
//! Pagination, scheduling and the record pipeline. Depends on the domain and
//! on the `SourceClient` seam, never on a concrete provider.

pub mod deduplicator;
pub mod normalizer;
pub mod pacing;
pub mod pipeline;
pub mod region_fetcher;
pub mod scheduler;

pub use deduplicator::{DedupResult, Fingerprint, dedupe};
pub use normalizer::{normalize, normalize_all};
pub use pacing::{Delay, TokioDelay};
pub use pipeline::{CollectionPipeline, RunReport};
pub use region_fetcher::{FetchSettings, PageBudget, RegionFetch, RegionFetcher};
pub use scheduler::{RegionAccumulator, RegionScheduler, ScheduleResult, ScheduleSettings};
