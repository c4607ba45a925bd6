//! End-to-end runs against scripted providers, through to the written files
use std::fs;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use feedback_collector::domain::{ProviderError, RegionStatus, SourceKind, TicketPayload};
use feedback_collector::infrastructure::{AppConfig, ConfigManager, OutputConfig, SourceConfig};
use feedback_collector::test_utils::{RecordingDelay, ScriptedPage, ScriptedSourceClient};
use feedback_collector::{CollectionPipeline, ResultWriter};

fn config(regions: &[&str], sources: Vec<SourceConfig>) -> AppConfig {
    let mut config = AppConfig::default();
    config.collection.regions = regions.iter().map(|r| (*r).to_string()).collect();
    config.sources = sources;
    config
}

fn output(dir: &TempDir) -> OutputConfig {
    OutputConfig {
        directory: dir.path().to_path_buf(),
        file_stem: "feedback".into(),
        timestamped: false,
    }
}

#[tokio::test]
async fn mixed_regions_produce_records_and_an_outcome_log() {
    let client = ScriptedSourceClient::new(SourceKind::AppStore)
        .with_pages("a", vec![ScriptedPage::full(50), ScriptedPage::full(10)])
        .with_pages(
            "c",
            vec![ScriptedPage::error(ProviderError::Http {
                status: 500,
                url: "https://itunes.apple.com/c/rss".into(),
            })],
        );
    let pipeline = CollectionPipeline::new(config(
        &["a", "b", "c"],
        vec![SourceConfig::new(SourceKind::AppStore, "284882215")],
    ))
    .unwrap()
    .with_client(Arc::new(client))
    .with_delay(Arc::new(RecordingDelay::default()));

    let report = pipeline.run(&CancellationToken::new()).await;
    let summary = &report.summary;

    assert_eq!(summary.total_records, 60);
    assert_eq!(summary.duplicates_removed, 0);
    assert_eq!(summary.region_outcomes.len(), 3);
    assert_eq!(summary.outcome(SourceKind::AppStore, "a").unwrap().status, RegionStatus::Collected);
    assert_eq!(summary.outcome(SourceKind::AppStore, "b").unwrap().status, RegionStatus::NoData);
    assert_eq!(summary.errored_regions(), 1);
    assert_eq!(summary.per_region.get("a"), Some(&60));

    // Generated ratings cycle 1..=5 over each page
    let histogram_total: usize = summary.rating_histogram.iter().map(|b| b.count).sum();
    assert_eq!(histogram_total, 60);
    let percent_total: f64 = summary.rating_histogram.iter().map(|b| b.percentage).sum();
    assert!((percent_total - 100.0).abs() < 1e-9);
    assert!(report.records.iter().all(|r| r.date == "2024-01-15"));
}

#[tokio::test]
async fn the_same_review_from_two_sources_is_kept_once() {
    // Generated payloads depend only on region, page and position
    let app_store = ScriptedSourceClient::new(SourceKind::AppStore)
        .with_pages("us", vec![ScriptedPage::full(5), ScriptedPage::full(0)]);
    let google_play = ScriptedSourceClient::new(SourceKind::GooglePlay)
        .with_pages("us", vec![ScriptedPage::full(5), ScriptedPage::full(0)]);

    let mut play = SourceConfig::new(SourceKind::GooglePlay, "com.example.app");
    play.credentials.insert("access_token", "token");
    let pipeline = CollectionPipeline::new(config(
        &["us"],
        vec![SourceConfig::new(SourceKind::AppStore, "1"), play],
    ))
    .unwrap()
    .with_client(Arc::new(app_store))
    .with_client(Arc::new(google_play))
    .with_delay(Arc::new(RecordingDelay::default()));

    let report = pipeline.run(&CancellationToken::new()).await;

    assert_eq!(report.summary.total_raw_records, 10);
    assert_eq!(report.summary.duplicates_removed, 5);
    assert!(report.records.iter().all(|r| r.source == SourceKind::AppStore));
    assert_eq!(report.summary.per_source.get(&SourceKind::GooglePlay), None);
}

#[tokio::test]
async fn written_csv_and_json_agree() {
    let tickets = vec![
        TicketPayload {
            ticket_id: Some(11),
            requester: Some("Dana".into()),
            subject: Some("Login fails".into()),
            description: Some("Cannot sign in, says \"expired\"".into()),
            status: Some("Solved".into()),
            priority: Some("low".into()),
            tags: vec!["auth".into(), "web".into()],
            created_at: Some("2024-03-01T09:30:00Z".into()),
            ..TicketPayload::default()
        },
        TicketPayload {
            ticket_id: Some(12),
            requester: Some("Eli".into()),
            description: Some("Export is slow".into()),
            status: Some("open".into()),
            priority: Some("urgent".into()),
            created_at: Some("2024-03-02T10:00:00Z".into()),
            ..TicketPayload::default()
        },
    ];
    let zendesk = ScriptedSourceClient::new(SourceKind::Zendesk)
        .with_pages("eu", vec![ScriptedPage::tickets(tickets)]);
    let app_store = ScriptedSourceClient::new(SourceKind::AppStore)
        .with_pages("us", vec![ScriptedPage::full(3)]);

    let mut desk = SourceConfig::new(SourceKind::Zendesk, "acme");
    desk.regions = Some(vec!["eu".into()]);
    desk.credentials.insert("email", "ops@example.com");
    desk.credentials.insert("api_token", "secret");
    let mut store = SourceConfig::new(SourceKind::AppStore, "1");
    store.regions = Some(vec!["us".into()]);
    store.min_page_size = Some(10);

    let pipeline = CollectionPipeline::new(config(&["us"], vec![desk, store]))
        .unwrap()
        .with_client(Arc::new(zendesk))
        .with_client(Arc::new(app_store))
        .with_delay(Arc::new(RecordingDelay::default()));
    let report = pipeline.run(&CancellationToken::new()).await;
    assert_eq!(report.records.len(), 5);

    let dir = TempDir::new().unwrap();
    let written = ResultWriter::new(output(&dir)).write(&report.records, &report.summary);
    assert!(written.is_complete());

    let json: Vec<Value> =
        serde_json::from_str(&fs::read_to_string(dir.path().join("feedback.json")).unwrap()).unwrap();
    let mut csv_reader = csv::Reader::from_path(dir.path().join("feedback.csv")).unwrap();
    let headers = csv_reader.headers().unwrap().clone();
    let rows: Vec<csv::StringRecord> = csv_reader.records().map(Result::unwrap).collect();

    assert_eq!(rows.len(), json.len());
    let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
    for (row, value) in rows.iter().zip(&json) {
        assert_eq!(&row[column("User Name")], value["author"].as_str().unwrap());
        assert_eq!(&row[column("Review Text")], value["body"].as_str().unwrap());
        assert_eq!(&row[column("Date")], value["date"].as_str().unwrap());
        let rating = value["rating"].as_u64().map(|r| r.to_string()).unwrap_or_default();
        assert_eq!(&row[column("Score")], rating.as_str());
    }

    let solved = json.iter().find(|v| v["ticket_id"] == 11).unwrap();
    assert_eq!(solved["rating"], 5);
    assert_eq!(solved["rating_origin"], "heuristic");
    assert_eq!(solved["ticket_status"], "solved");
    assert_eq!(solved["body"], "Login fails\n\nCannot sign in, says \"expired\" [tags: auth, web]");
    let urgent = json.iter().find(|v| v["ticket_id"] == 12).unwrap();
    assert_eq!(urgent["rating"], 1);

    let summary: Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("feedback_summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(summary["total_records"], 5);
    assert_eq!(summary["heuristic_ratings"], 2);
}

#[tokio::test]
async fn zero_records_still_write_every_output() {
    let client = ScriptedSourceClient::new(SourceKind::Trustpilot);
    let pipeline = CollectionPipeline::new(config(
        &["us"],
        vec![SourceConfig::new(SourceKind::Trustpilot, "example.com")],
    ))
    .unwrap()
    .with_client(Arc::new(client))
    .with_delay(Arc::new(RecordingDelay::default()));
    let report = pipeline.run(&CancellationToken::new()).await;
    assert!(report.records.is_empty());
    assert_eq!(report.summary.average_rating, None);

    let dir = TempDir::new().unwrap();
    let written = ResultWriter::new(output(&dir)).write(&report.records, &report.summary);
    assert!(written.is_complete());
    let json = fs::read_to_string(dir.path().join("feedback.json")).unwrap();
    assert_eq!(serde_json::from_str::<Vec<Value>>(&json).unwrap().len(), 0);
    let csv = fs::read_to_string(dir.path().join("feedback.csv")).unwrap();
    assert_eq!(csv.lines().count(), 1);
}

#[test]
fn configuration_file_drives_the_run_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("collector.toml");
    fs::write(
        &path,
        r#"
[collection]
regions = ["us", "gb"]
max_pages = 4
inter_page_delay_ms = 10

[[sources]]
kind = "trustpilot"
provider_id = "example.com"

[[sources]]
kind = "app_store"
provider_id = "284882215"
enabled = false
"#,
    )
    .unwrap();

    let config = ConfigManager::new(Some(path)).load().unwrap();
    assert_eq!(config.collection.regions, vec!["us", "gb"]);
    assert_eq!(config.collection.max_pages, 4);
    assert_eq!(config.enabled_sources().count(), 1);
    assert!(config.validate().is_ok());
}
