//! Region scheduling for one source
//!
//! Sequential by default. With `max_concurrent_regions > 1` regions run on a
//! bounded buffered stream; each worker's output is tagged with its position
//! in the configured region list and merged in that order once every region
//! finished, so the accumulated records match the sequential ordering.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::pacing::Delay;
use crate::application::region_fetcher::{FetchSettings, PageBudget, RegionFetch, RegionFetcher};
use crate::domain::{RawRecord, Region, RegionOutcome, RegionStatus, SourceKind, StopReason};
use crate::infrastructure::sources::SourceClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub regions: Vec<Region>,
    pub fetch: FetchSettings,
    pub inter_region_delay: Duration,
    pub max_concurrent_regions: usize,
    /// Tightens the `max_pages × regions` budget shared by all regions.
    pub global_page_ceiling: Option<u32>,
}

impl ScheduleSettings {
    /// Pages this source may request across all of its regions.
    pub fn page_budget(&self) -> PageBudget {
        let region_count = u32::try_from(self.regions.len()).unwrap_or(u32::MAX);
        let natural = self.fetch.limits.max_pages.saturating_mul(region_count);
        match self.global_page_ceiling {
            Some(ceiling) => PageBudget::limited(ceiling.min(natural)),
            None => PageBudget::limited(natural),
        }
    }
}

/// Records and outcome log gathered across regions, in configured order.
#[derive(Debug, Default)]
pub struct RegionAccumulator {
    records: Vec<RawRecord>,
    outcomes: Vec<RegionOutcome>,
}

impl RegionAccumulator {
    pub fn push(&mut self, source: SourceKind, fetch: RegionFetch) {
        let status = fetch.status();
        match &status {
            RegionStatus::Collected => info!(
                "✅ {}/{}: collected {} records",
                source,
                fetch.region,
                fetch.records.len()
            ),
            RegionStatus::NoData => info!("📭 {}/{}: no data", source, fetch.region),
            RegionStatus::BudgetExhausted => warn!(
                "⏭️ {}/{}: skipped, page budget spent before the first request",
                source, fetch.region
            ),
            RegionStatus::Errored { error } => warn!(
                "❌ {}/{}: errored after {} records: {}",
                source,
                fetch.region,
                fetch.records.len(),
                error
            ),
            RegionStatus::Cancelled => info!("🛑 {}/{}: cancelled", source, fetch.region),
        }

        self.outcomes.push(RegionOutcome {
            source,
            region: fetch.region,
            status,
            raw_records: fetch.records.len(),
            pages_fetched: fetch.pages_fetched,
            stop_reason: fetch.stop_reason,
        });
        self.records.extend(fetch.records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_result(self, source: SourceKind) -> ScheduleResult {
        ScheduleResult {
            source,
            records: self.records,
            outcomes: self.outcomes,
        }
    }
}

#[derive(Debug)]
pub struct ScheduleResult {
    pub source: SourceKind,
    pub records: Vec<RawRecord>,
    pub outcomes: Vec<RegionOutcome>,
}

pub struct RegionScheduler {
    source: SourceKind,
    fetcher: RegionFetcher,
    delay: Arc<dyn Delay>,
    settings: ScheduleSettings,
}

impl RegionScheduler {
    pub fn new(client: Arc<dyn SourceClient>, delay: Arc<dyn Delay>, settings: ScheduleSettings) -> Self {
        let source = client.kind();
        Self {
            source,
            fetcher: RegionFetcher::new(client, delay.clone(), settings.fetch),
            delay,
            settings,
        }
    }

    pub const fn settings(&self) -> &ScheduleSettings {
        &self.settings
    }

    pub async fn run(&self, cancel: &CancellationToken) -> ScheduleResult {
        let budget = self.settings.page_budget();
        info!(
            "🚀 {}: {} region(s), up to {} concurrently, page budget {:?}",
            self.source,
            self.settings.regions.len(),
            self.settings.max_concurrent_regions,
            budget.remaining()
        );

        let accumulator = if self.settings.max_concurrent_regions > 1 {
            self.run_concurrent(&budget, cancel).await
        } else {
            self.run_sequential(&budget, cancel).await
        };

        info!(
            "🏁 {}: {} raw records from {} region(s)",
            self.source,
            accumulator.len(),
            self.settings.regions.len()
        );
        accumulator.into_result(self.source)
    }

    async fn run_sequential(&self, budget: &PageBudget, cancel: &CancellationToken) -> RegionAccumulator {
        let mut accumulator = RegionAccumulator::default();
        let last = self.settings.regions.len().saturating_sub(1);

        for (index, region) in self.settings.regions.iter().enumerate() {
            let fetch = self.fetch_one(region, budget, cancel, index == last).await;
            accumulator.push(self.source, fetch);
        }
        accumulator
    }

    async fn run_concurrent(&self, budget: &PageBudget, cancel: &CancellationToken) -> RegionAccumulator {
        let last = self.settings.regions.len().saturating_sub(1);

        let mut finished: Vec<(usize, RegionFetch)> = stream::iter(self.settings.regions.iter().enumerate())
            .map(|(index, region)| async move {
                (index, self.fetch_one(region, budget, cancel, index == last).await)
            })
            .buffer_unordered(self.settings.max_concurrent_regions)
            .collect()
            .await;

        // Merge in configured order
        finished.sort_by_key(|(index, _)| *index);
        let mut accumulator = RegionAccumulator::default();
        for (_, fetch) in finished {
            accumulator.push(self.source, fetch);
        }
        accumulator
    }

    async fn fetch_one(
        &self,
        region: &Region,
        budget: &PageBudget,
        cancel: &CancellationToken,
        is_last: bool,
    ) -> RegionFetch {
        if cancel.is_cancelled() {
            return RegionFetch {
                region: region.clone(),
                records: Vec::new(),
                pages_fetched: 0,
                stop_reason: StopReason::Cancelled,
                error: None,
            };
        }

        let fetch = self.fetcher.fetch_region(region, budget, cancel).await;

        if !is_last && !cancel.is_cancelled() {
            tokio::select! {
                () = self.delay.pause(self.settings.inter_region_delay) => {}
                () = cancel.cancelled() => {}
            }
        }
        fetch
    }
}
