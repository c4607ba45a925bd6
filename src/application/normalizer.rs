//! Provider records to canonical records
//!
//! Normalization is total: malformed or missing fields degrade to empty
//! values or an absent rating, never to an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    AuxiliaryData, CanonicalRecord, Rating, RatingOrigin, RawPayload, RawRecord, SourceKind,
    StoreReview, TicketExtension, TicketPayload,
};

/// Ticket states that count as a successful resolution.
pub const RESOLVED_STATUSES: &[&str] = &["solved", "closed", "resolved"];
/// Ticket states still waiting on someone.
pub const UNRESOLVED_STATUSES: &[&str] = &["new", "open", "pending", "hold"];

const BASE_TICKET_SCORE: i32 = 3;

const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Map one raw record, joining auxiliary data when present.
pub fn normalize(raw: &RawRecord, aux: Option<&AuxiliaryData>) -> CanonicalRecord {
    let source = raw.source();
    let id = format!("{}-{}", source.short_code(), Uuid::new_v4());
    let region = Some(raw.region().as_str().to_string());

    match raw.payload() {
        RawPayload::AppStore(review) | RawPayload::GooglePlay(review) | RawPayload::Trustpilot(review) => {
            normalize_review(id, region, source, review)
        }
        RawPayload::Zendesk(ticket) => {
            let joined = ticket
                .ticket_id
                .and_then(|ticket_id| aux?.satisfaction_for(raw.region(), ticket_id));
            normalize_ticket(id, region, ticket, joined)
        }
    }
}

/// Normalize a whole record set, preserving order.
pub fn normalize_all(records: &[RawRecord], aux: &AuxiliaryData) -> Vec<CanonicalRecord> {
    let aux = (!aux.is_empty()).then_some(aux);
    records.iter().map(|raw| normalize(raw, aux)).collect()
}

fn normalize_review(
    id: String,
    region: Option<String>,
    source: SourceKind,
    review: &StoreReview,
) -> CanonicalRecord {
    let rating = review.rating.as_ref().and_then(parse_rating);
    CanonicalRecord {
        id,
        author: clean(review.author.as_deref()),
        rating,
        rating_origin: rating.map(|_| RatingOrigin::Reported),
        body: clean(review.body.as_deref()),
        title: non_empty(review.title.as_deref()),
        date: date_string(review.date.as_deref()),
        helpful_count: parse_helpful_count(review.helpful_count.as_ref()),
        source,
        region,
        app_version: non_empty(review.app_version.as_deref()),
        ticket: None,
    }
}

fn normalize_ticket(
    id: String,
    region: Option<String>,
    ticket: &TicketPayload,
    joined_satisfaction: Option<&str>,
) -> CanonicalRecord {
    let satisfaction = joined_satisfaction.or(ticket.satisfaction.as_deref());
    let (rating, origin) = ticket_rating(
        ticket.status.as_deref(),
        ticket.priority.as_deref(),
        satisfaction,
    );

    CanonicalRecord {
        id,
        author: clean(ticket.requester.as_deref()),
        rating: Some(rating),
        rating_origin: Some(origin),
        body: ticket_body(
            ticket.subject.as_deref(),
            ticket.description.as_deref(),
            &ticket.tags,
        ),
        title: non_empty(ticket.subject.as_deref()),
        date: date_string(ticket.created_at.as_deref()),
        helpful_count: 0,
        source: SourceKind::Zendesk,
        region,
        app_version: None,
        ticket: Some(TicketExtension {
            ticket_id: ticket.ticket_id,
            ticket_status: non_empty(ticket.status.as_deref()).map(|s| s.to_lowercase()),
            ticket_priority: non_empty(ticket.priority.as_deref()).map(|p| p.to_lowercase()),
            ticket_tags: ticket.tags.clone(),
        }),
    }
}

/// Integer-valued rating in `1..=5` from a number, integral float or numeric string.
pub fn parse_rating(value: &Value) -> Option<Rating> {
    let number = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }?;
    Rating::new(number)
}

/// Non-negative vote count, 0 when missing or malformed.
pub fn parse_helpful_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().and_then(integral).and_then(|v| u64::try_from(v).ok()))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15).then_some(value as i64)
}

/// Satisfaction survey score mapped to the rating scale.
pub fn satisfaction_rating(score: &str) -> Option<Rating> {
    let score = score.trim().to_lowercase();
    if score.starts_with("good") {
        Rating::new(5)
    } else if score.starts_with("bad") {
        Rating::new(1)
    } else {
        None
    }
}

/// Rating for a support ticket.
///
/// A satisfaction survey answer wins. Otherwise the score is inferred from
/// the ticket's state: base 3, nudged by resolution status and priority.
pub fn ticket_rating(
    status: Option<&str>,
    priority: Option<&str>,
    satisfaction: Option<&str>,
) -> (Rating, RatingOrigin) {
    if let Some(rating) = satisfaction.and_then(satisfaction_rating) {
        return (rating, RatingOrigin::SatisfactionSurvey);
    }

    let status = status.map(|s| s.trim().to_lowercase()).unwrap_or_default();
    let priority = priority.map(|p| p.trim().to_lowercase()).unwrap_or_default();

    let mut score = BASE_TICKET_SCORE;
    if RESOLVED_STATUSES.contains(&status.as_str()) {
        score += 1;
    } else if UNRESOLVED_STATUSES.contains(&status.as_str()) {
        score -= 1;
    }
    match priority.as_str() {
        "urgent" | "high" => score -= 1,
        "low" => score += 1,
        _ => {}
    }
    (Rating::clamped(score), RatingOrigin::Heuristic)
}

/// Subject and description joined when both exist and differ, then a tag suffix.
pub fn ticket_body(subject: Option<&str>, description: Option<&str>, tags: &[String]) -> String {
    let subject = subject.map(str::trim).filter(|s| !s.is_empty());
    let description = description.map(str::trim).filter(|s| !s.is_empty());

    let mut body = match (subject, description) {
        (Some(subject), Some(description)) if subject != description => {
            format!("{subject}\n\n{description}")
        }
        (_, Some(text)) | (Some(text), None) => text.to_string(),
        (None, None) => String::new(),
    };

    if !tags.is_empty() {
        if !body.is_empty() {
            body.push(' ');
        }
        body.push_str(&format!("[tags: {}]", tags.join(", ")));
    }
    body
}

/// Calendar date from an ISO date, RFC 3339 timestamp, naive timestamp or epoch seconds.
pub fn calendar_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.date_naive());
    }
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, format) {
            return Some(timestamp.date());
        }
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        let value: i64 = text.parse().ok()?;
        // 13-digit values are epoch milliseconds
        let seconds = if text.len() >= 13 { value / 1000 } else { value };
        return DateTime::from_timestamp(seconds, 0).map(|t| t.date_naive());
    }
    None
}

fn date_string(text: Option<&str>) -> String {
    text.and_then(calendar_date)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn clean(text: Option<&str>) -> String {
    text.map(str::trim).unwrap_or_default().to_string()
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
