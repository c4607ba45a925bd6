//! Feedback Collector - multi-source, multi-region review and ticket collection
//!
//! Pulls user feedback from app stores, review sites and support desks,
//! paginating each region under shared limits, then deduplicates and
//! normalizes everything into one canonical record stream with a run summary.

pub mod application;
pub mod domain;
pub mod infrastructure;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use application::{CollectionPipeline, RunReport};
pub use domain::{CanonicalRecord, CollectorError, RunSummary, SourceKind};
pub use infrastructure::{AppConfig, ConfigManager, ResultWriter, WriteReport};
