//! Provider-native records as they come off the wire
//!
//! Each known source maps into an explicit field list. Fields the adapter
//! does not recognize are kept in `extra` so nothing is silently dropped.
//! Values whose type varies between providers (ratings, vote counts) stay as
//! raw JSON and are interpreted by the normalizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::region::{Region, SourceKind};

/// Review from an app store or public review site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreReview {
    pub review_id: Option<String>,
    pub author: Option<String>,
    pub rating: Option<Value>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub date: Option<String>,
    pub helpful_count: Option<Value>,
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Support ticket from a helpdesk system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketPayload {
    pub ticket_id: Option<u64>,
    pub requester: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Option<String>,
    /// Inline satisfaction score when the provider embeds it on the ticket.
    pub satisfaction: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Tagged union over the known source shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RawPayload {
    AppStore(StoreReview),
    GooglePlay(StoreReview),
    Trustpilot(StoreReview),
    Zendesk(TicketPayload),
}

impl RawPayload {
    pub const fn source(&self) -> SourceKind {
        match self {
            Self::AppStore(_) => SourceKind::AppStore,
            Self::GooglePlay(_) => SourceKind::GooglePlay,
            Self::Trustpilot(_) => SourceKind::Trustpilot,
            Self::Zendesk(_) => SourceKind::Zendesk,
        }
    }

    /// Wrap a store review in the variant matching `source`.
    ///
    /// Ticketing sources cannot carry a store review; the review is then
    /// re-shaped into a ticket so the data still flows through.
    pub fn store(source: SourceKind, review: StoreReview) -> Self {
        match source {
            SourceKind::AppStore => Self::AppStore(review),
            SourceKind::GooglePlay => Self::GooglePlay(review),
            SourceKind::Trustpilot => Self::Trustpilot(review),
            SourceKind::Zendesk => Self::Zendesk(TicketPayload {
                requester: review.author,
                subject: review.title,
                description: review.body,
                created_at: review.date,
                extra: review.extra,
                ..TicketPayload::default()
            }),
        }
    }

    pub fn author(&self) -> Option<&str> {
        match self {
            Self::AppStore(r) | Self::GooglePlay(r) | Self::Trustpilot(r) => r.author.as_deref(),
            Self::Zendesk(t) => t.requester.as_deref(),
        }
    }

    /// Primary free text used for fingerprinting.
    pub fn body_text(&self) -> Option<&str> {
        match self {
            Self::AppStore(r) | Self::GooglePlay(r) | Self::Trustpilot(r) => r.body.as_deref(),
            Self::Zendesk(t) => t.description.as_deref().or(t.subject.as_deref()),
        }
    }

    pub fn date_text(&self) -> Option<&str> {
        match self {
            Self::AppStore(r) | Self::GooglePlay(r) | Self::Trustpilot(r) => r.date.as_deref(),
            Self::Zendesk(t) => t.created_at.as_deref(),
        }
    }
}

/// A provider record tagged with where it came from. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    region: Region,
    page_index: u32,
    fetched_at: DateTime<Utc>,
    payload: RawPayload,
}

impl RawRecord {
    pub fn new(region: Region, page_index: u32, payload: RawPayload) -> Self {
        Self {
            region,
            page_index,
            fetched_at: Utc::now(),
            payload,
        }
    }

    pub const fn source(&self) -> SourceKind {
        self.payload.source()
    }

    pub const fn region(&self) -> &Region {
        &self.region
    }

    pub const fn page_index(&self) -> u32 {
        self.page_index
    }

    pub const fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub const fn payload(&self) -> &RawPayload {
        &self.payload
    }
}
