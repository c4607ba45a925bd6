//! Domain module - records, pagination state and run statistics
//!
//! Everything in here is free of I/O. Provider adapters and the pipeline
//! build on these types.

pub mod auxiliary;
pub mod canonical;
pub mod errors;
pub mod fetch_state;
pub mod raw_record;
pub mod region;
pub mod summary;

pub use auxiliary::AuxiliaryData;
pub use canonical::{CanonicalRecord, Rating, RatingOrigin, TicketExtension};
pub use errors::{CollectorError, ConfigurationError, ProviderError, WriteError};
pub use fetch_state::{FetchLimits, FetchPhase, FetchState, NextPage, StopReason};
pub use raw_record::{RawPayload, RawRecord, StoreReview, TicketPayload};
pub use region::{Region, SourceKind};
pub use summary::{RegionOutcome, RegionStatus, RunSummary};
