//! Cross-region, cross-source duplicate removal
//!
//! Two records are the same feedback when author, normalized body text and
//! calendar date agree. Rating, region, helpful count and source are ignored,
//! so the same review served by several regional endpoints collapses to the
//! first one seen. Distinct reviews that happen to share all three keys are
//! merged too.

use std::collections::HashSet;

use tracing::info;

use crate::application::normalizer::calendar_date;
use crate::domain::RawRecord;

/// BLAKE3 digest of a record's identity fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(record: &RawRecord) -> Self {
        let payload = record.payload();
        let author = payload.author().map(str::trim).unwrap_or_default();
        let body = normalize_body(payload.body_text().unwrap_or_default());
        let raw_date = payload.date_text().map(str::trim).unwrap_or_default();
        let date = calendar_date(raw_date)
            .map_or_else(|| raw_date.to_string(), |d| d.format("%Y-%m-%d").to_string());

        let mut hasher = blake3::Hasher::new();
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart
        for field in [author, body.as_str(), date.as_str()] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }
}

/// Lowercased with whitespace runs collapsed to single spaces.
pub fn normalize_body(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug)]
pub struct DedupResult {
    pub records: Vec<RawRecord>,
    pub duplicates_removed: usize,
}

/// Keep the first occurrence of every fingerprint, preserving input order.
pub fn dedupe(records: Vec<RawRecord>) -> DedupResult {
    let total = records.len();
    let mut seen = HashSet::with_capacity(total);
    let records: Vec<RawRecord> = records
        .into_iter()
        .filter(|record| seen.insert(Fingerprint::of(record)))
        .collect();
    let duplicates_removed = total - records.len();

    info!(
        "🧹 Deduplicated {} records: {} kept, {} duplicates removed",
        total,
        records.len(),
        duplicates_removed
    );
    DedupResult {
        records,
        duplicates_removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RawPayload, Region, StoreReview};
    use serde_json::json;

    fn review(region: &str, author: &str, body: &str, date: &str, rating: u8) -> RawRecord {
        RawRecord::new(
            Region::new(region),
            1,
            RawPayload::AppStore(StoreReview {
                author: Some(author.into()),
                body: Some(body.into()),
                date: Some(date.into()),
                rating: Some(json!(rating)),
                ..StoreReview::default()
            }),
        )
    }

    #[test]
    fn rating_and_region_differences_still_collapse() {
        let records = vec![
            review("us", "Alice", "Great app", "2024-01-15", 4),
            review("gb", "Alice", "Great app", "2024-01-15", 5),
        ];
        let result = dedupe(records);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.records[0].region().as_str(), "us");
    }

    #[test]
    fn body_whitespace_and_case_are_normalized() {
        let a = review("us", "Bob", "Works  fine\n", "2024-01-15", 4);
        let b = review("us", "Bob", "works fine", "2024-01-15T08:00:00Z", 4);
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn different_dates_are_distinct() {
        let a = review("us", "Bob", "ok", "2024-01-15", 4);
        let b = review("us", "Bob", "ok", "2024-01-16", 4);
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn unparseable_dates_compare_as_written() {
        let a = review("us", "Bob", "ok", "last Tuesday", 4);
        let b = review("us", "Bob", "ok", " last Tuesday ", 4);
        let c = review("us", "Bob", "ok", "yesterday", 4);
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&c));
    }

    #[test]
    fn order_of_first_occurrences_is_kept() {
        let records = vec![
            review("us", "A", "one", "2024-01-01", 1),
            review("us", "B", "two", "2024-01-01", 1),
            review("gb", "A", "one", "2024-01-01", 1),
            review("us", "C", "three", "2024-01-01", 1),
        ];
        let result = dedupe(records);
        let authors: Vec<&str> = result
            .records
            .iter()
            .filter_map(|r| r.payload().author())
            .collect();
        assert_eq!(authors, vec!["A", "B", "C"]);
    }

    #[test]
    fn empty_input() {
        let result = dedupe(Vec::new());
        assert!(result.records.is_empty());
        assert_eq!(result.duplicates_removed, 0);
    }
}
