//! Full pagination of one region against one source
//!
//! Drives the `FetchState` machine: one request per iteration, cancellation
//! and the shared page budget checked at the top of every loop, inter-page
//! pause while `Waiting`. Provider failures are recorded, never retried,
//! and never discard the records already collected.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::pacing::Delay;
use crate::domain::{
    FetchLimits, FetchPhase, FetchState, ProviderError, RawRecord, Region, RegionStatus,
    StopReason,
};
use crate::infrastructure::sources::{PageRequest, SourceClient};

/// Page budget shared by every region of one source. `None` means unlimited.
#[derive(Debug)]
pub struct PageBudget {
    remaining: Option<AtomicU32>,
}

impl PageBudget {
    pub const fn unlimited() -> Self {
        Self { remaining: None }
    }

    pub const fn limited(pages: u32) -> Self {
        Self {
            remaining: Some(AtomicU32::new(pages)),
        }
    }

    /// Take one page from the budget. Returns `false` once it is spent.
    pub fn try_reserve(&self) -> bool {
        match &self.remaining {
            None => true,
            Some(remaining) => remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
                .is_ok(),
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining.as_ref().map(|r| r.load(Ordering::Acquire))
    }
}

/// Per-source pagination settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub limits: FetchLimits,
    pub page_size: u32,
    pub inter_page_delay: Duration,
}

/// Everything one region produced.
#[derive(Debug)]
pub struct RegionFetch {
    pub region: Region,
    pub records: Vec<RawRecord>,
    pub pages_fetched: u32,
    pub stop_reason: StopReason,
    pub error: Option<ProviderError>,
}

impl RegionFetch {
    pub fn status(&self) -> RegionStatus {
        match (&self.error, self.stop_reason) {
            (Some(error), _) => RegionStatus::Errored {
                error: error.to_string(),
            },
            (None, StopReason::Cancelled) => RegionStatus::Cancelled,
            (None, StopReason::GlobalPageCeiling) if self.pages_fetched == 0 => {
                RegionStatus::BudgetExhausted
            }
            (None, _) if self.records.is_empty() => RegionStatus::NoData,
            (None, _) => RegionStatus::Collected,
        }
    }
}

pub struct RegionFetcher {
    client: Arc<dyn SourceClient>,
    delay: Arc<dyn Delay>,
    settings: FetchSettings,
}

impl RegionFetcher {
    pub fn new(client: Arc<dyn SourceClient>, delay: Arc<dyn Delay>, settings: FetchSettings) -> Self {
        Self {
            client,
            delay,
            settings,
        }
    }

    pub const fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub async fn fetch_region(
        &self,
        region: &Region,
        budget: &PageBudget,
        cancel: &CancellationToken,
    ) -> RegionFetch {
        let source = self.client.kind();
        let limits = self.settings.limits;
        let mut state = FetchState::new();
        let mut records = Vec::new();
        let mut error = None;

        while state.can_fetch(&limits) {
            if cancel.is_cancelled() {
                state.finish(StopReason::Cancelled);
                break;
            }
            if !budget.try_reserve() {
                debug!("{}/{}: global page budget spent", source, region);
                state.finish(StopReason::GlobalPageCeiling);
                break;
            }

            let request = PageRequest {
                page_index: state.page_index(),
                cursor: state.cursor().map(str::to_string),
                page_size: self.settings.page_size,
            };

            match self.client.request(region, &request).await {
                Ok(page) => {
                    let count = page.records.len();
                    records.extend(
                        page.records
                            .into_iter()
                            .map(|payload| RawRecord::new(region.clone(), request.page_index, payload)),
                    );
                    debug!(
                        "{}/{} page {}: {} records",
                        source, region, request.page_index, count
                    );
                    state.record_page(count, page.next, &limits);
                }
                Err(e) => {
                    warn!(
                        "⚠️ {}/{} page {} failed: {}",
                        source, region, request.page_index, e
                    );
                    state.record_failure();
                    error = Some(e);
                }
            }

            if state.phase() == FetchPhase::Waiting {
                tokio::select! {
                    () = self.delay.pause(self.settings.inter_page_delay) => {}
                    () = cancel.cancelled() => {}
                }
                state.resume();
            }
        }

        // Loop condition failed without a terminal transition
        state.finish(StopReason::PageCeiling);
        let stop_reason = state.stop_reason().unwrap_or(StopReason::PageCeiling);

        info!(
            "📄 {}/{}: {} records from {} page(s), stopped: {}",
            source,
            region,
            records.len(),
            state.pages_fetched(),
            stop_reason.as_str()
        );

        RegionFetch {
            region: region.clone(),
            records,
            pages_fetched: state.pages_fetched(),
            stop_reason,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NextPage, SourceKind};
    use crate::test_utils::{CancellingDelay, RecordingDelay, ScriptedPage, ScriptedSourceClient};

    fn settings(max_pages: u32, min_page_size: usize) -> FetchSettings {
        FetchSettings {
            limits: FetchLimits {
                max_pages,
                min_page_size,
            },
            page_size: 50,
            inter_page_delay: Duration::from_millis(2000),
        }
    }

    fn fetcher(
        client: Arc<ScriptedSourceClient>,
        delay: Arc<RecordingDelay>,
        settings: FetchSettings,
    ) -> RegionFetcher {
        RegionFetcher::new(client, delay, settings)
    }

    #[tokio::test]
    async fn constant_full_pages_stop_at_page_ceiling() {
        let client = Arc::new(
            ScriptedSourceClient::new(SourceKind::AppStore).with_fallback(ScriptedPage::full(50)),
        );
        let delay = Arc::new(RecordingDelay::default());
        let fetch = fetcher(client.clone(), delay.clone(), settings(10, 1))
            .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
            .await;

        assert_eq!(client.request_count(), 10);
        assert_eq!(fetch.records.len(), 500);
        assert_eq!(fetch.stop_reason, StopReason::PageCeiling);
        assert_eq!(fetch.status(), RegionStatus::Collected);
        // No pause after the final page
        assert_eq!(delay.pauses().len(), 9);
    }

    #[tokio::test]
    async fn two_consecutive_empty_pages_end_region() {
        let client = Arc::new(
            ScriptedSourceClient::new(SourceKind::AppStore)
                .with_pages("us", vec![ScriptedPage::full(50), ScriptedPage::empty(), ScriptedPage::empty()])
                .with_fallback(ScriptedPage::full(50)),
        );
        let fetch = fetcher(client.clone(), Arc::default(), settings(10, 1))
            .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
            .await;

        assert_eq!(client.request_count(), 3);
        assert_eq!(fetch.records.len(), 50);
        assert_eq!(fetch.stop_reason, StopReason::EmptyPages);
    }

    #[tokio::test]
    async fn single_empty_page_does_not_stop() {
        let client = Arc::new(
            ScriptedSourceClient::new(SourceKind::AppStore)
                .with_pages(
                    "us",
                    vec![ScriptedPage::empty(), ScriptedPage::full(5), ScriptedPage::empty(), ScriptedPage::empty()],
                ),
        );
        let fetch = fetcher(client.clone(), Arc::default(), settings(10, 1))
            .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
            .await;

        assert_eq!(client.request_count(), 4);
        assert_eq!(fetch.records.len(), 5);
    }

    #[tokio::test]
    async fn short_page_stops_after_keeping_it() {
        let client = Arc::new(
            ScriptedSourceClient::new(SourceKind::AppStore)
                .with_pages("us", vec![ScriptedPage::full(50), ScriptedPage::full(10)])
                .with_fallback(ScriptedPage::full(50)),
        );
        let fetch = fetcher(client.clone(), Arc::default(), settings(10, 50))
            .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
            .await;

        assert_eq!(fetch.records.len(), 60);
        assert_eq!(fetch.stop_reason, StopReason::ShortPage);
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn cursor_is_forwarded_until_exhausted() {
        let client = Arc::new(
            ScriptedSourceClient::new(SourceKind::GooglePlay).with_pages(
                "us",
                vec![
                    ScriptedPage::full(3).with_next(NextPage::Cursor("c1".into())),
                    ScriptedPage::full(3).with_next(NextPage::Cursor("c2".into())),
                    ScriptedPage::full(3).with_next(NextPage::End),
                ],
            ),
        );
        let fetch = fetcher(client.clone(), Arc::default(), settings(10, 1))
            .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
            .await;

        let cursors: Vec<Option<String>> = client.requests().into_iter().map(|(_, r)| r.cursor).collect();
        assert_eq!(cursors, vec![None, Some("c1".into()), Some("c2".into())]);
        assert_eq!(fetch.stop_reason, StopReason::CursorExhausted);
        assert_eq!(fetch.records.len(), 9);
    }

    #[tokio::test]
    async fn failure_keeps_partial_records() {
        let client = Arc::new(
            ScriptedSourceClient::new(SourceKind::AppStore).with_pages(
                "us",
                vec![
                    ScriptedPage::full(20),
                    ScriptedPage::error(ProviderError::Timeout("slow".into())),
                ],
            ),
        );
        let fetch = fetcher(client.clone(), Arc::default(), settings(10, 1))
            .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
            .await;

        assert_eq!(fetch.records.len(), 20);
        assert_eq!(fetch.stop_reason, StopReason::ProviderFailure);
        assert!(matches!(fetch.status(), RegionStatus::Errored { .. }));
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn first_page_error_yields_no_records() {
        let client = Arc::new(
            ScriptedSourceClient::new(SourceKind::AppStore)
                .with_pages("us", vec![ScriptedPage::error(ProviderError::Network("down".into()))]),
        );
        let fetch = fetcher(client, Arc::default(), settings(10, 1))
            .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
            .await;

        assert!(fetch.records.is_empty());
        assert_eq!(fetch.pages_fetched, 0);
        assert!(fetch.error.is_some());
    }

    #[tokio::test]
    async fn spent_budget_stops_region() {
        let client = Arc::new(
            ScriptedSourceClient::new(SourceKind::AppStore).with_fallback(ScriptedPage::full(10)),
        );
        let budget = PageBudget::limited(3);
        let fetch = fetcher(client.clone(), Arc::default(), settings(10, 1))
            .fetch_region(&Region::new("us"), &budget, &CancellationToken::new())
            .await;

        assert_eq!(client.request_count(), 3);
        assert_eq!(fetch.stop_reason, StopReason::GlobalPageCeiling);
        assert_eq!(fetch.status(), RegionStatus::Collected);
        assert_eq!(budget.remaining(), Some(0));
    }

    #[tokio::test]
    async fn region_skipped_by_spent_budget_is_not_reported_empty() {
        let client = Arc::new(
            ScriptedSourceClient::new(SourceKind::AppStore).with_fallback(ScriptedPage::full(10)),
        );
        let fetch = fetcher(client.clone(), Arc::default(), settings(10, 1))
            .fetch_region(&Region::new("us"), &PageBudget::limited(0), &CancellationToken::new())
            .await;

        assert_eq!(client.request_count(), 0);
        assert_eq!(fetch.pages_fetched, 0);
        assert_eq!(fetch.stop_reason, StopReason::GlobalPageCeiling);
        assert_eq!(fetch.status(), RegionStatus::BudgetExhausted);
    }

    #[tokio::test]
    async fn region_that_found_nothing_is_no_data() {
        let client = Arc::new(ScriptedSourceClient::new(SourceKind::AppStore));
        let fetch = fetcher(client.clone(), Arc::default(), settings(10, 1))
            .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
            .await;

        assert_eq!(client.request_count(), 2);
        assert_eq!(fetch.stop_reason, StopReason::EmptyPages);
        assert_eq!(fetch.status(), RegionStatus::NoData);
    }

    #[tokio::test]
    async fn cancel_during_page_pause_keeps_collected_records() {
        let client = Arc::new(
            ScriptedSourceClient::new(SourceKind::AppStore).with_fallback(ScriptedPage::full(50)),
        );
        let cancel = CancellationToken::new();
        let delay = Arc::new(CancellingDelay::new(cancel.clone()));
        let fetch = RegionFetcher::new(client.clone(), delay.clone(), settings(10, 1))
            .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &cancel)
            .await;

        assert_eq!(client.request_count(), 1);
        assert_eq!(delay.pauses(), vec![Duration::from_millis(2000)]);
        assert_eq!(fetch.records.len(), 50);
        assert_eq!(fetch.pages_fetched, 1);
        assert_eq!(fetch.stop_reason, StopReason::Cancelled);
        assert_eq!(fetch.status(), RegionStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_before_start_issues_no_request() {
        let client = Arc::new(
            ScriptedSourceClient::new(SourceKind::AppStore).with_fallback(ScriptedPage::full(10)),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let fetch = fetcher(client.clone(), Arc::default(), settings(10, 1))
            .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &cancel)
            .await;

        assert_eq!(client.request_count(), 0);
        assert_eq!(fetch.stop_reason, StopReason::Cancelled);
        assert_eq!(fetch.status(), RegionStatus::Cancelled);
    }

    #[test]
    fn budget_never_goes_negative() {
        let budget = PageBudget::limited(1);
        assert!(budget.try_reserve());
        assert!(!budget.try_reserve());
        assert!(PageBudget::unlimited().try_reserve());
    }
}
