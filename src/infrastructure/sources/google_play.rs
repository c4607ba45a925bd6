//! Google Play Developer API reviews

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{PageRequest, SourceClient, SourcePage, take_string};
use crate::domain::{NextPage, ProviderError, RawPayload, Region, SourceKind, StoreReview};
use crate::infrastructure::http_client::{HttpClient, RequestAuth};

const API_BASE: &str = "https://androidpublisher.googleapis.com/androidpublisher/v3/applications";
/// Largest page the reviews endpoint accepts.
const MAX_RESULTS: u32 = 100;

pub struct GooglePlayClient {
    http: Arc<HttpClient>,
    package_name: String,
    access_token: String,
}

impl GooglePlayClient {
    pub fn new(
        http: Arc<HttpClient>,
        package_name: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            package_name: package_name.into(),
            access_token: access_token.into(),
        }
    }

    fn reviews_url(&self) -> String {
        format!("{}/{}/reviews", API_BASE, self.package_name)
    }
}

#[async_trait]
impl SourceClient for GooglePlayClient {
    fn kind(&self) -> SourceKind {
        SourceKind::GooglePlay
    }

    async fn request(&self, region: &Region, page: &PageRequest) -> Result<SourcePage, ProviderError> {
        let mut query = vec![
            ("maxResults", page.page_size.clamp(1, MAX_RESULTS).to_string()),
            ("translationLanguage", region.to_string()),
        ];
        if let Some(cursor) = &page.cursor {
            query.push(("token", cursor.clone()));
        }

        let document = self
            .http
            .get_json(
                &self.reviews_url(),
                &query,
                &RequestAuth::Bearer(self.access_token.clone()),
            )
            .await?;
        let (reviews, next) = parse_reviews(&document);
        tracing::debug!(
            "Google Play {} page {}: {} reviews",
            region,
            page.page_index,
            reviews.len()
        );
        Ok(SourcePage::new(
            reviews.into_iter().map(RawPayload::GooglePlay).collect(),
            next,
        ))
    }
}

/// Extract reviews and the continuation token from a reviews response.
pub fn parse_reviews(document: &Value) -> (Vec<StoreReview>, NextPage) {
    let reviews = document
        .get("reviews")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(parse_review)
                .collect()
        })
        .unwrap_or_default();

    let next = document
        .pointer("/tokenPagination/nextPageToken")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map_or(NextPage::End, |token| NextPage::Cursor(token.to_string()));

    (reviews, next)
}

fn parse_review(review: &Map<String, Value>) -> StoreReview {
    let mut extra = review.clone();
    let review_id = take_string(&mut extra, "reviewId");
    let author = take_string(&mut extra, "authorName");

    // The first comment is the user's; a later one, if any, is the developer reply.
    let mut user_comment = None;
    if let Some(Value::Array(comments)) = extra.remove("comments") {
        for comment in comments {
            if let Some(user) = comment.get("userComment") {
                user_comment.get_or_insert_with(|| user.clone());
            } else if let Some(reply) = comment.get("developerComment") {
                extra.insert("developerComment".to_string(), reply.clone());
            }
        }
    }

    let user = user_comment.unwrap_or(Value::Null);
    let text = |key: &str| {
        user.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let date = user
        .pointer("/lastModified/seconds")
        .and_then(|seconds| match seconds {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    StoreReview {
        review_id,
        author,
        rating: user.get("starRating").cloned(),
        title: None,
        body: text("text"),
        date,
        helpful_count: user.get("thumbsUpCount").cloned(),
        app_version: text("appVersionName"),
        extra,
    }
}
