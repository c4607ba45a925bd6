//! Test utilities
//!
//! An in-memory `SourceClient` driven by per-region scripts, a `Delay`
//! that records requested pauses instead of sleeping, and one that cancels
//! the run from inside a pause.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::application::pacing::Delay;
use crate::domain::{
    AuxiliaryData, NextPage, ProviderError, RawPayload, Region, SourceKind, StoreReview,
    TicketPayload,
};
use crate::infrastructure::sources::{PageRequest, SourceClient, SourcePage};

/// One scripted response.
#[derive(Debug, Clone)]
pub enum ScriptedPage {
    /// `count` unique generated records.
    Generated { count: usize, next: NextPage },
    /// Exactly these payloads.
    Records { records: Vec<RawPayload>, next: NextPage },
    Error(ProviderError),
}

impl ScriptedPage {
    pub const fn full(count: usize) -> Self {
        Self::Generated {
            count,
            next: NextPage::Index,
        }
    }

    pub const fn empty() -> Self {
        Self::full(0)
    }

    pub const fn error(error: ProviderError) -> Self {
        Self::Error(error)
    }

    pub fn records(records: Vec<RawPayload>) -> Self {
        Self::Records {
            records,
            next: NextPage::Index,
        }
    }

    pub fn tickets(tickets: Vec<TicketPayload>) -> Self {
        Self::records(tickets.into_iter().map(RawPayload::Zendesk).collect())
    }

    #[must_use]
    pub fn with_next(self, next: NextPage) -> Self {
        match self {
            Self::Generated { count, .. } => Self::Generated { count, next },
            Self::Records { records, .. } => Self::Records { records, next },
            Self::Error(e) => Self::Error(e),
        }
    }
}

#[derive(Default)]
struct ScriptState {
    /// Remaining pages per region
    pages: HashMap<Region, Vec<ScriptedPage>>,
    requests: Vec<(Region, PageRequest)>,
}

/// Scripted provider. A region's pages are served in order; once its script
/// runs out the fallback page is served, or an empty page when there is none.
pub struct ScriptedSourceClient {
    kind: SourceKind,
    state: Mutex<ScriptState>,
    fallback: Option<ScriptedPage>,
    auxiliary: HashMap<Region, AuxiliaryData>,
}

impl ScriptedSourceClient {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            state: Mutex::new(ScriptState::default()),
            fallback: None,
            auxiliary: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_pages(self, region: &str, mut pages: Vec<ScriptedPage>) -> Self {
        pages.reverse();
        if let Ok(mut state) = self.state.lock() {
            state.pages.insert(Region::new(region), pages);
        }
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, page: ScriptedPage) -> Self {
        self.fallback = Some(page);
        self
    }

    #[must_use]
    pub fn with_satisfaction(mut self, region: &str, ticket_id: u64, score: &str) -> Self {
        let region = Region::new(region);
        self.auxiliary
            .entry(region.clone())
            .or_default()
            .insert_satisfaction(region, ticket_id, score);
        self
    }

    pub fn requests(&self) -> Vec<(Region, PageRequest)> {
        self.state
            .lock()
            .map(|state| state.requests.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    fn generate(&self, region: &Region, page_index: u32, count: usize) -> Vec<RawPayload> {
        (0..count)
            .map(|i| {
                let review = StoreReview {
                    review_id: Some(format!("{region}-{page_index}-{i}")),
                    author: Some(format!("user-{region}-{page_index}-{i}")),
                    rating: Some(json!(i % 5 + 1)),
                    body: Some(format!("Review {i} on page {page_index} in {region}")),
                    date: Some("2024-01-15".to_string()),
                    ..StoreReview::default()
                };
                RawPayload::store(self.kind, review)
            })
            .collect()
    }
}

#[async_trait]
impl SourceClient for ScriptedSourceClient {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn request(&self, region: &Region, page: &PageRequest) -> Result<SourcePage, ProviderError> {
        let scripted = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| ProviderError::Network("script poisoned".to_string()))?;
            state.requests.push((region.clone(), page.clone()));
            state.pages.get_mut(region).and_then(Vec::pop)
        };

        match scripted.or_else(|| self.fallback.clone()) {
            Some(ScriptedPage::Generated { count, next }) => Ok(SourcePage::new(
                self.generate(region, page.page_index, count),
                next,
            )),
            Some(ScriptedPage::Records { records, next }) => Ok(SourcePage::new(records, next)),
            Some(ScriptedPage::Error(error)) => Err(error),
            None => Ok(SourcePage::new(Vec::new(), NextPage::Index)),
        }
    }

    async fn auxiliary(&self, region: &Region) -> Result<AuxiliaryData, ProviderError> {
        Ok(self.auxiliary.get(region).cloned().unwrap_or_default())
    }
}

/// Records every pause and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingDelay {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.pauses().iter().sum()
    }
}

#[async_trait]
impl Delay for RecordingDelay {
    async fn pause(&self, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(duration);
        }
    }
}

/// Cancels `token` during the first pause, as a Ctrl-C between pages would.
#[derive(Debug)]
pub struct CancellingDelay {
    token: CancellationToken,
    inner: RecordingDelay,
}

impl CancellingDelay {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            inner: RecordingDelay::default(),
        }
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.inner.pauses()
    }
}

#[async_trait]
impl Delay for CancellingDelay {
    async fn pause(&self, duration: Duration) {
        self.inner.pause(duration).await;
        self.token.cancel();
    }
}
