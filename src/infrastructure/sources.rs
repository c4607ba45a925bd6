//! Provider adapters behind the `SourceClient` seam
//!
//! One adapter per external feedback system. Each performs a single
//! paginated request per call and maps the provider's native shape into a
//! `RawPayload`; pagination policy lives in the region fetcher.

pub mod app_store;
pub mod google_play;
pub mod trustpilot;
pub mod zendesk;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::{AuxiliaryData, NextPage, ProviderError, RawPayload, Region, SourceKind};
use crate::infrastructure::config::{Credentials, SourceConfig};
use crate::infrastructure::http_client::HttpClient;

pub use app_store::AppStoreClient;
pub use google_play::GooglePlayClient;
pub use trustpilot::TrustpilotClient;
pub use zendesk::ZendeskClient;

/// Position to request. Cursor sources use `cursor`, the rest `page_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page_index: u32,
    pub cursor: Option<String>,
    pub page_size: u32,
}

/// One page of provider records.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    pub records: Vec<RawPayload>,
    pub next: NextPage,
}

impl SourcePage {
    pub const fn new(records: Vec<RawPayload>, next: NextPage) -> Self {
        Self { records, next }
    }

    pub const fn end() -> Self {
        Self {
            records: Vec::new(),
            next: NextPage::End,
        }
    }
}

/// A single external provider, queried one page at a time.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn request(&self, region: &Region, page: &PageRequest) -> Result<SourcePage, ProviderError>;

    /// Side data joined onto this source's records (e.g. satisfaction ratings).
    async fn auxiliary(&self, _region: &Region) -> Result<AuxiliaryData, ProviderError> {
        Ok(AuxiliaryData::default())
    }
}

/// Build the adapter for a configured source. Credentials must already be resolved.
pub fn build_client(
    source: &SourceConfig,
    credentials: &Credentials,
    http: Arc<HttpClient>,
) -> Arc<dyn SourceClient> {
    let provider_id = source.provider_id.trim().to_string();
    match source.kind {
        SourceKind::AppStore => Arc::new(AppStoreClient::new(http, provider_id)),
        SourceKind::GooglePlay => Arc::new(GooglePlayClient::new(
            http,
            provider_id,
            credentials.get("access_token").unwrap_or_default().to_string(),
        )),
        SourceKind::Zendesk => Arc::new(ZendeskClient::new(
            http,
            provider_id,
            credentials.get("email").unwrap_or_default().to_string(),
            credentials.get("api_token").unwrap_or_default().to_string(),
        )),
        SourceKind::Trustpilot => Arc::new(TrustpilotClient::new(http, provider_id)),
    }
}

/// Remove `key` from `object` and return it as a trimmed, non-empty string.
pub(crate) fn take_string(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    match object.remove(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => {
            object.insert(key.to_string(), other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn take_string_trims_and_consumes() {
        let mut object = json!({"a": "  hi ", "b": 3, "c": "", "d": {"x": 1}})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(take_string(&mut object, "a").as_deref(), Some("hi"));
        assert_eq!(take_string(&mut object, "b").as_deref(), Some("3"));
        assert_eq!(take_string(&mut object, "c"), None);
        assert_eq!(take_string(&mut object, "d"), None);
        assert!(object.contains_key("d"));
        assert!(!object.contains_key("a"));
    }

    #[test]
    fn factory_builds_matching_adapter() {
        let http = Arc::new(HttpClient::new(Default::default()).unwrap());
        let mut credentials = Credentials::default();
        credentials.insert("access_token", "t");
        for kind in SourceKind::ALL {
            let source = SourceConfig::new(kind, "id");
            let client = build_client(&source, &credentials, http.clone());
            assert_eq!(client.kind(), kind);
        }
    }
}
