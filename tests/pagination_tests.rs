//! Region pagination termination and scheduling behaviour
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use feedback_collector::application::{
    FetchSettings, PageBudget, RegionFetcher, RegionScheduler, ScheduleSettings,
};
use feedback_collector::domain::{
    FetchLimits, NextPage, ProviderError, Region, RegionStatus, SourceKind, StopReason,
};
use feedback_collector::test_utils::{
    CancellingDelay, RecordingDelay, ScriptedPage, ScriptedSourceClient,
};

const PAGE_DELAY: Duration = Duration::from_millis(2000);
const REGION_DELAY: Duration = Duration::from_millis(500);

fn settings(max_pages: u32, min_page_size: usize) -> FetchSettings {
    FetchSettings {
        limits: FetchLimits {
            max_pages,
            min_page_size,
        },
        page_size: 50,
        inter_page_delay: PAGE_DELAY,
    }
}

fn fetcher(client: ScriptedSourceClient, settings: FetchSettings) -> (RegionFetcher, Arc<ScriptedSourceClient>, Arc<RecordingDelay>) {
    let client = Arc::new(client);
    let delay = Arc::new(RecordingDelay::default());
    (
        RegionFetcher::new(client.clone(), delay.clone(), settings),
        client,
        delay,
    )
}

#[tokio::test]
async fn full_pages_stop_at_the_page_ceiling() {
    let client = ScriptedSourceClient::new(SourceKind::AppStore).with_fallback(ScriptedPage::full(50));
    let (fetcher, client, delay) = fetcher(client, settings(10, 1));

    let fetch = fetcher
        .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
        .await;

    assert_eq!(client.request_count(), 10);
    assert_eq!(fetch.records.len(), 500);
    assert_eq!(fetch.stop_reason, StopReason::PageCeiling);
    // No pause after the final page
    assert_eq!(delay.pauses().len(), 9);
    assert!(delay.pauses().iter().all(|d| *d == PAGE_DELAY));
}

#[tokio::test]
async fn two_consecutive_empty_pages_end_the_region() {
    let client = ScriptedSourceClient::new(SourceKind::AppStore).with_pages(
        "us",
        vec![ScriptedPage::full(20), ScriptedPage::empty(), ScriptedPage::empty(), ScriptedPage::full(20)],
    );
    let (fetcher, client, _) = fetcher(client, settings(10, 0));

    let fetch = fetcher
        .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
        .await;

    assert_eq!(client.request_count(), 3);
    assert_eq!(fetch.records.len(), 20);
    assert_eq!(fetch.stop_reason, StopReason::EmptyPages);
    assert_eq!(fetch.status(), RegionStatus::Collected);
}

#[tokio::test]
async fn a_single_empty_page_between_full_ones_does_not_stop() {
    let client = ScriptedSourceClient::new(SourceKind::AppStore).with_pages(
        "us",
        vec![ScriptedPage::full(5), ScriptedPage::empty(), ScriptedPage::full(5)],
    );
    let (fetcher, client, _) = fetcher(client, settings(3, 0));

    let fetch = fetcher
        .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
        .await;

    assert_eq!(client.request_count(), 3);
    assert_eq!(fetch.records.len(), 10);
    assert_eq!(fetch.stop_reason, StopReason::PageCeiling);
}

#[tokio::test]
async fn short_page_is_kept_then_stops() {
    let client = ScriptedSourceClient::new(SourceKind::GooglePlay)
        .with_pages("us", vec![ScriptedPage::full(50), ScriptedPage::full(7)])
        .with_fallback(ScriptedPage::full(50));
    let (fetcher, client, _) = fetcher(client, settings(10, 10));

    let fetch = fetcher
        .fetch_region(&Region::new("us"), &PageBudget::unlimited(), &CancellationToken::new())
        .await;

    assert_eq!(client.request_count(), 2);
    assert_eq!(fetch.records.len(), 57);
    assert_eq!(fetch.stop_reason, StopReason::ShortPage);
}

#[tokio::test]
async fn cursor_pagination_follows_tokens_until_exhausted() {
    let client = ScriptedSourceClient::new(SourceKind::Zendesk).with_pages(
        "eu",
        vec![
            ScriptedPage::full(3).with_next(NextPage::Cursor("c1".into())),
            ScriptedPage::full(3).with_next(NextPage::Cursor("c2".into())),
            ScriptedPage::full(3).with_next(NextPage::End),
        ],
    );
    let (fetcher, client, _) = fetcher(client, settings(10, 0));

    let fetch = fetcher
        .fetch_region(&Region::new("eu"), &PageBudget::unlimited(), &CancellationToken::new())
        .await;

    let cursors: Vec<Option<String>> = client
        .requests()
        .into_iter()
        .map(|(_, request)| request.cursor)
        .collect();
    assert_eq!(cursors, vec![None, Some("c1".into()), Some("c2".into())]);
    assert_eq!(fetch.records.len(), 9);
    assert_eq!(fetch.stop_reason, StopReason::CursorExhausted);
}

#[tokio::test]
async fn provider_failure_keeps_partial_records() {
    let client = ScriptedSourceClient::new(SourceKind::Trustpilot).with_pages(
        "de",
        vec![
            ScriptedPage::full(20),
            ScriptedPage::full(20),
            ScriptedPage::error(ProviderError::Http {
                status: 503,
                url: "https://de.trustpilot.com/review/example.com?page=3".into(),
            }),
        ],
    );
    let (fetcher, client, _) = fetcher(client, settings(10, 1));

    let fetch = fetcher
        .fetch_region(&Region::new("de"), &PageBudget::unlimited(), &CancellationToken::new())
        .await;

    assert_eq!(client.request_count(), 3);
    assert_eq!(fetch.records.len(), 40);
    assert_eq!(fetch.stop_reason, StopReason::ProviderFailure);
    assert!(matches!(fetch.status(), RegionStatus::Errored { .. }));
}

#[tokio::test]
async fn scheduler_reports_every_region_in_configured_order() {
    let client = ScriptedSourceClient::new(SourceKind::AppStore)
        .with_pages("a", vec![ScriptedPage::full(50), ScriptedPage::full(10)])
        .with_pages(
            "c",
            vec![ScriptedPage::error(ProviderError::Network("connection reset".into()))],
        );
    let client = Arc::new(client);
    let delay = Arc::new(RecordingDelay::default());
    let scheduler = RegionScheduler::new(
        client.clone(),
        delay.clone(),
        ScheduleSettings {
            regions: vec![Region::new("a"), Region::new("b"), Region::new("c")],
            fetch: settings(10, 1),
            inter_region_delay: REGION_DELAY,
            max_concurrent_regions: 1,
            global_page_ceiling: None,
        },
    );

    let result = scheduler.run(&CancellationToken::new()).await;

    assert_eq!(result.records.len(), 60);
    let regions: Vec<&str> = result.outcomes.iter().map(|o| o.region.as_str()).collect();
    assert_eq!(regions, vec!["a", "b", "c"]);
    assert_eq!(result.outcomes[0].status, RegionStatus::Collected);
    assert_eq!(result.outcomes[1].status, RegionStatus::NoData);
    assert!(matches!(result.outcomes[2].status, RegionStatus::Errored { .. }));
    let region_pauses = delay.pauses().iter().filter(|d| **d == REGION_DELAY).count();
    assert_eq!(region_pauses, 2);
}

#[tokio::test]
async fn concurrent_regions_share_the_global_ceiling() {
    let client = Arc::new(
        ScriptedSourceClient::new(SourceKind::AppStore).with_fallback(ScriptedPage::full(50)),
    );
    let scheduler = RegionScheduler::new(
        client.clone(),
        Arc::new(RecordingDelay::default()),
        ScheduleSettings {
            regions: ["us", "gb", "de", "fr"].iter().map(Region::new).collect(),
            fetch: settings(10, 1),
            inter_region_delay: Duration::ZERO,
            max_concurrent_regions: 3,
            global_page_ceiling: Some(7),
        },
    );

    let result = scheduler.run(&CancellationToken::new()).await;

    assert_eq!(client.request_count(), 7);
    assert_eq!(result.records.len(), 350);
    let total_pages: u32 = result.outcomes.iter().map(|o| o.pages_fetched).sum();
    assert_eq!(total_pages, 7);
    let regions: Vec<&str> = result.outcomes.iter().map(|o| o.region.as_str()).collect();
    assert_eq!(regions, vec!["us", "gb", "de", "fr"]);
}

#[tokio::test]
async fn cancelled_run_issues_no_requests() {
    let client = Arc::new(
        ScriptedSourceClient::new(SourceKind::AppStore).with_fallback(ScriptedPage::full(50)),
    );
    let scheduler = RegionScheduler::new(
        client.clone(),
        Arc::new(RecordingDelay::default()),
        ScheduleSettings {
            regions: vec![Region::new("us"), Region::new("gb")],
            fetch: settings(10, 1),
            inter_region_delay: REGION_DELAY,
            max_concurrent_regions: 1,
            global_page_ceiling: None,
        },
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = scheduler.run(&cancel).await;

    assert_eq!(client.request_count(), 0);
    assert!(result.records.is_empty());
    assert!(result.outcomes.iter().all(|o| o.status == RegionStatus::Cancelled));
}

#[tokio::test]
async fn cancellation_between_pages_keeps_partial_region() {
    let client = Arc::new(
        ScriptedSourceClient::new(SourceKind::AppStore).with_fallback(ScriptedPage::full(50)),
    );
    let cancel = CancellationToken::new();
    let scheduler = RegionScheduler::new(
        client.clone(),
        Arc::new(CancellingDelay::new(cancel.clone())),
        ScheduleSettings {
            regions: vec![Region::new("us"), Region::new("gb")],
            fetch: settings(10, 1),
            inter_region_delay: REGION_DELAY,
            max_concurrent_regions: 1,
            global_page_ceiling: None,
        },
    );

    let result = scheduler.run(&cancel).await;

    assert_eq!(client.request_count(), 1);
    assert_eq!(result.records.len(), 50);
    assert_eq!(result.outcomes[0].raw_records, 50);
    assert_eq!(result.outcomes[0].stop_reason, StopReason::Cancelled);
    assert_eq!(result.outcomes[1].pages_fetched, 0);
    assert!(result.outcomes.iter().all(|o| o.status == RegionStatus::Cancelled));
}

#[tokio::test]
async fn regions_beyond_the_ceiling_are_reported_as_skipped() {
    let client = Arc::new(
        ScriptedSourceClient::new(SourceKind::AppStore).with_fallback(ScriptedPage::full(50)),
    );
    let scheduler = RegionScheduler::new(
        client.clone(),
        Arc::new(RecordingDelay::default()),
        ScheduleSettings {
            regions: vec![Region::new("us"), Region::new("gb")],
            fetch: settings(3, 1),
            inter_region_delay: REGION_DELAY,
            max_concurrent_regions: 1,
            global_page_ceiling: Some(3),
        },
    );

    let result = scheduler.run(&CancellationToken::new()).await;

    assert_eq!(client.request_count(), 3);
    assert_eq!(result.outcomes[0].status, RegionStatus::Collected);
    assert_eq!(result.outcomes[1].status, RegionStatus::BudgetExhausted);
    assert_ne!(result.outcomes[1].status, RegionStatus::NoData);
}
