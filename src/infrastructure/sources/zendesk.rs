//! Zendesk support tickets and satisfaction ratings
//!
//! Tickets are read with cursor pagination and the `users` sideload so the
//! requester's display name is available without extra calls. Satisfaction
//! ratings come from their own endpoint and are joined during normalization.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{PageRequest, SourceClient, SourcePage, take_string};
use crate::domain::{
    AuxiliaryData, NextPage, ProviderError, RawPayload, Region, SourceKind, TicketPayload,
};
use crate::infrastructure::http_client::{HttpClient, RequestAuth};

/// Cursor pagination page size limit.
const MAX_PAGE_SIZE: u32 = 100;
/// Upper bound on satisfaction rating pages read per region.
const MAX_SATISFACTION_PAGES: u32 = 20;

pub struct ZendeskClient {
    http: Arc<HttpClient>,
    subdomain_template: String,
    auth: RequestAuth,
}

impl ZendeskClient {
    /// `subdomain_template` may contain `{region}` to address one instance per region.
    pub fn new(
        http: Arc<HttpClient>,
        subdomain_template: impl Into<String>,
        email: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            subdomain_template: subdomain_template.into(),
            auth: RequestAuth::Basic {
                username: format!("{}/token", email.into()),
                password: api_token.into(),
            },
        }
    }

    pub fn base_url(&self, region: &Region) -> String {
        let subdomain = self.subdomain_template.replace("{region}", region.as_str());
        format!("https://{subdomain}.zendesk.com/api/v2")
    }

    fn page_query(page_size: u32, cursor: Option<&String>) -> Vec<(&'static str, String)> {
        let mut query = vec![("page[size]", page_size.clamp(1, MAX_PAGE_SIZE).to_string())];
        if let Some(cursor) = cursor {
            query.push(("page[after]", cursor.clone()));
        }
        query
    }
}

#[async_trait]
impl SourceClient for ZendeskClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Zendesk
    }

    async fn request(&self, region: &Region, page: &PageRequest) -> Result<SourcePage, ProviderError> {
        let url = format!("{}/tickets.json", self.base_url(region));
        let mut query = Self::page_query(page.page_size, page.cursor.as_ref());
        query.push(("include", "users".to_string()));

        let document = self.http.get_json(&url, &query, &self.auth).await?;
        let tickets = parse_tickets(&document);
        tracing::debug!(
            "Zendesk {} page {}: {} tickets",
            region,
            page.page_index,
            tickets.len()
        );
        Ok(SourcePage::new(
            tickets.into_iter().map(RawPayload::Zendesk).collect(),
            next_cursor(&document),
        ))
    }

    async fn auxiliary(&self, region: &Region) -> Result<AuxiliaryData, ProviderError> {
        let url = format!("{}/satisfaction_ratings.json", self.base_url(region));
        let mut data = AuxiliaryData::default();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_SATISFACTION_PAGES {
            let query = Self::page_query(MAX_PAGE_SIZE, cursor.as_ref());
            let document = self.http.get_json(&url, &query, &self.auth).await?;
            for (ticket_id, score) in parse_satisfaction(&document) {
                data.insert_satisfaction(region.clone(), ticket_id, score);
            }
            match next_cursor(&document) {
                NextPage::Cursor(after) => cursor = Some(after),
                _ => break,
            }
        }

        tracing::debug!("Zendesk {}: {} satisfaction ratings", region, data.len());
        Ok(data)
    }
}

/// `meta.has_more` plus `meta.after_cursor` drive continuation.
pub fn next_cursor(document: &Value) -> NextPage {
    let has_more = document
        .pointer("/meta/has_more")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let after = document
        .pointer("/meta/after_cursor")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty());
    match (has_more, after) {
        (true, Some(after)) => NextPage::Cursor(after.to_string()),
        _ => NextPage::End,
    }
}

/// Extract tickets, resolving requester names from the sideloaded users.
pub fn parse_tickets(document: &Value) -> Vec<TicketPayload> {
    let users: HashMap<u64, String> = document
        .get("users")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|user| {
            let id = user.get("id")?.as_u64()?;
            let name = user.get("name")?.as_str()?.trim();
            (!name.is_empty()).then(|| (id, name.to_string()))
        })
        .collect();

    document
        .get("tickets")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .map(|ticket| parse_ticket(ticket, &users))
        .collect()
}

fn parse_ticket(ticket: &Map<String, Value>, users: &HashMap<u64, String>) -> TicketPayload {
    let mut extra = ticket.clone();
    let ticket_id = extra.remove("id").and_then(|id| id.as_u64());
    let requester = extra
        .get("requester_id")
        .and_then(Value::as_u64)
        .and_then(|id| users.get(&id).cloned());
    let tags = match extra.remove("tags") {
        Some(Value::Array(tags)) => tags
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    let satisfaction = match extra.remove("satisfaction_rating") {
        Some(Value::Object(rating)) => rating
            .get("score")
            .and_then(Value::as_str)
            .filter(|score| is_answered(score))
            .map(str::to_string),
        _ => None,
    };

    TicketPayload {
        ticket_id,
        requester,
        subject: take_string(&mut extra, "subject"),
        description: take_string(&mut extra, "description"),
        status: take_string(&mut extra, "status"),
        priority: take_string(&mut extra, "priority"),
        tags,
        created_at: take_string(&mut extra, "created_at"),
        satisfaction,
        extra,
    }
}

/// `(ticket id, score)` pairs from a satisfaction ratings page.
pub fn parse_satisfaction(document: &Value) -> Vec<(u64, String)> {
    document
        .get("satisfaction_ratings")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|rating| {
            let ticket_id = rating.get("ticket_id")?.as_u64()?;
            let score = rating.get("score")?.as_str()?;
            is_answered(score).then(|| (ticket_id, score.to_string()))
        })
        .collect()
}

/// Offered-but-unanswered surveys carry no signal.
fn is_answered(score: &str) -> bool {
    !matches!(score, "" | "unoffered" | "offered")
}
