//! App Store customer review RSS feed

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{PageRequest, SourceClient, SourcePage};
use crate::domain::{NextPage, ProviderError, RawPayload, Region, SourceKind, StoreReview};
use crate::infrastructure::http_client::{HttpClient, RequestAuth};

/// The feed never serves more than this many pages.
pub const FEED_PAGE_LIMIT: u32 = 10;

pub struct AppStoreClient {
    http: Arc<HttpClient>,
    app_id: String,
}

impl AppStoreClient {
    pub fn new(http: Arc<HttpClient>, app_id: impl Into<String>) -> Self {
        Self {
            http,
            app_id: app_id.into(),
        }
    }

    pub fn feed_url(&self, region: &Region, page_index: u32) -> String {
        format!(
            "https://itunes.apple.com/{}/rss/customerreviews/page={}/id={}/sortby=mostrecent/json",
            region, page_index, self.app_id
        )
    }
}

#[async_trait]
impl SourceClient for AppStoreClient {
    fn kind(&self) -> SourceKind {
        SourceKind::AppStore
    }

    async fn request(&self, region: &Region, page: &PageRequest) -> Result<SourcePage, ProviderError> {
        let url = self.feed_url(region, page.page_index);
        let document = self.http.get_json(&url, &[], &RequestAuth::None).await?;

        let records: Vec<RawPayload> = parse_feed(&document)
            .into_iter()
            .map(RawPayload::AppStore)
            .collect();
        tracing::debug!(
            "App Store {} page {}: {} reviews",
            region,
            page.page_index,
            records.len()
        );

        let next = if page.page_index >= FEED_PAGE_LIMIT {
            NextPage::End
        } else {
            NextPage::Index
        };
        Ok(SourcePage::new(records, next))
    }
}

/// Extract reviews from a feed document.
///
/// `feed.entry` is an array, a single object when only one entry exists, or
/// absent on an empty page. The app's own metadata entry (carrying
/// `im:name`) is skipped.
pub fn parse_feed(document: &Value) -> Vec<StoreReview> {
    let entries: Vec<&Value> = match document.pointer("/feed/entry") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(Value::as_object)
        .filter(|entry| !entry.contains_key("im:name"))
        .map(parse_entry)
        .collect()
}

fn parse_entry(entry: &Map<String, Value>) -> StoreReview {
    let mut extra = entry.clone();
    let mut label = |key: &str| -> Option<String> {
        let value = extra.remove(key)?;
        label_of(&value)
    };

    let review_id = label("id");
    let rating = label("im:rating").map(Value::String);
    let title = label("title");
    let body = label("content");
    let date = label("updated");
    let app_version = label("im:version");
    let helpful_count = label("im:voteCount").map(Value::String);
    let author = extra
        .remove("author")
        .and_then(|author| author.get("name").and_then(label_of));

    StoreReview {
        review_id,
        author,
        rating,
        title,
        body,
        date,
        helpful_count,
        app_version,
        extra,
    }
}

/// Feed values are wrapped as `{"label": "..."}`.
fn label_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::Object(object) => object.get("label")?.as_str()?,
        Value::String(s) => s.as_str(),
        _ => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
