//! End-to-end collection run
//!
//! Configuration → per-source region scheduling → auxiliary joins →
//! deduplication → normalization → summary. Provider failures are contained
//! per region; only invalid configuration fails a run, and it does so before
//! any request is made.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::deduplicator::dedupe;
use crate::application::normalizer::normalize_all;
use crate::application::pacing::{Delay, TokioDelay};
use crate::application::region_fetcher::FetchSettings;
use crate::application::scheduler::{RegionScheduler, ScheduleSettings};
use crate::domain::{
    AuxiliaryData, CanonicalRecord, CollectorError, FetchLimits, RawRecord, RegionOutcome,
    RunSummary, SourceKind,
};
use crate::infrastructure::config::{AppConfig, Credentials, SourceConfig};
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::sources::{SourceClient, build_client};

/// Result of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub records: Vec<CanonicalRecord>,
    pub summary: RunSummary,
    pub cancelled: bool,
}

/// A validated source with its resolved credentials.
struct PreparedSource {
    config: SourceConfig,
    credentials: Credentials,
}

pub struct CollectionPipeline {
    config: AppConfig,
    sources: Vec<PreparedSource>,
    http: Arc<HttpClient>,
    clients: HashMap<SourceKind, Arc<dyn SourceClient>>,
    delay: Arc<dyn Delay>,
}

impl CollectionPipeline {
    /// Validate configuration and resolve credentials from the process environment.
    pub fn new(config: AppConfig) -> Result<Self, CollectorError> {
        Self::with_env_lookup(config, |name| std::env::var(name).ok())
    }

    /// Like `new`, resolving `env:` credential references through `lookup`.
    pub fn with_env_lookup<F>(config: AppConfig, lookup: F) -> Result<Self, CollectorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        config.validate()?;

        let sources = config
            .enabled_sources()
            .map(|source| -> Result<PreparedSource, CollectorError> {
                let credentials = source.credentials.resolve_with(source.kind, &lookup)?;
                Ok(PreparedSource {
                    config: source.clone(),
                    credentials,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let http = HttpClient::new(config.http.clone())
            .map_err(|e| CollectorError::HttpClient(e.to_string()))?;

        Ok(Self {
            config,
            sources,
            http: Arc::new(http),
            clients: HashMap::new(),
            delay: Arc::new(TokioDelay),
        })
    }

    /// Use `client` instead of the network adapter for its source kind.
    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn SourceClient>) -> Self {
        self.clients.insert(client.kind(), client);
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    fn client_for(&self, source: &PreparedSource) -> Arc<dyn SourceClient> {
        self.clients.get(&source.config.kind).cloned().unwrap_or_else(|| {
            build_client(&source.config, &source.credentials, self.http.clone())
        })
    }

    fn schedule_settings(&self, source: &SourceConfig) -> ScheduleSettings {
        let collection = &self.config.collection;
        ScheduleSettings {
            regions: source.effective_regions(collection),
            fetch: FetchSettings {
                limits: FetchLimits {
                    max_pages: source.effective_max_pages(collection),
                    min_page_size: source.effective_min_page_size(collection),
                },
                page_size: source.effective_page_size(collection),
                inter_page_delay: Duration::from_millis(collection.inter_page_delay_ms),
            },
            inter_region_delay: Duration::from_millis(collection.inter_region_delay_ms),
            max_concurrent_regions: collection.max_concurrent_regions,
            global_page_ceiling: collection.global_page_ceiling,
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> RunReport {
        let started_at = Utc::now();
        let mut raw_records: Vec<RawRecord> = Vec::new();
        let mut outcomes: Vec<RegionOutcome> = Vec::new();
        let mut aux = AuxiliaryData::default();

        for source in &self.sources {
            if cancel.is_cancelled() {
                warn!("🛑 Run cancelled before {}", source.config.kind);
                break;
            }

            let client = self.client_for(source);
            let scheduler = RegionScheduler::new(
                client.clone(),
                self.delay.clone(),
                self.schedule_settings(&source.config),
            );
            let result = scheduler.run(cancel).await;

            for outcome in result.outcomes.iter().filter(|o| o.raw_records > 0) {
                if cancel.is_cancelled() {
                    break;
                }
                match client.auxiliary(&outcome.region).await {
                    Ok(data) => aux.merge(data),
                    Err(e) => warn!(
                        "⚠️ {}/{}: auxiliary data unavailable: {}",
                        result.source, outcome.region, e
                    ),
                }
            }

            raw_records.extend(result.records);
            outcomes.extend(result.outcomes);
        }

        let total_raw = raw_records.len();
        let deduped = dedupe(raw_records);
        let records = normalize_all(&deduped.records, &aux);
        let summary = RunSummary::build(
            total_raw,
            deduped.duplicates_removed,
            &records,
            outcomes,
            self.config.collection.summary_top_n,
        );

        info!(
            "🎉 Collection finished: {} raw, {} duplicates, {} records, {} errored region(s)",
            summary.total_raw_records,
            summary.duplicates_removed,
            summary.total_records,
            summary.errored_regions()
        );

        RunReport {
            started_at,
            records,
            summary,
            cancelled: cancel.is_cancelled(),
        }
    }
}
