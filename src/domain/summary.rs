//! Run-level statistics, computed once from the final record set

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::canonical::CanonicalRecord;
use crate::domain::fetch_state::StopReason;
use crate::domain::region::{Region, SourceKind};

/// How a single region ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegionStatus {
    Collected,
    NoData,
    /// Never queried: the source's shared page budget was spent first.
    BudgetExhausted,
    Errored { error: String },
    Cancelled,
}

impl RegionStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Collected => "collected",
            Self::NoData => "no data",
            Self::BudgetExhausted => "budget exhausted",
            Self::Errored { .. } => "errored",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Entry of the per-region outcome log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOutcome {
    pub source: SourceKind,
    pub region: Region,
    #[serde(flatten)]
    pub status: RegionStatus,
    pub raw_records: usize,
    pub pages_fetched: u32,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingBucket {
    pub rating: u8,
    pub count: usize,
    /// Share of rated records, 0–100.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionCount {
    pub value: String,
    pub count: usize,
}

/// Top-N values of one secondary dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub dimension: String,
    pub entries: Vec<DimensionCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub total_raw_records: usize,
    pub duplicates_removed: usize,
    pub total_records: usize,
    pub rating_histogram: Vec<RatingBucket>,
    pub unrated_records: usize,
    pub heuristic_ratings: usize,
    pub average_rating: Option<f64>,
    pub per_source: BTreeMap<SourceKind, usize>,
    pub per_region: BTreeMap<String, usize>,
    pub region_outcomes: Vec<RegionOutcome>,
    pub breakdowns: Vec<Breakdown>,
}

impl RunSummary {
    pub fn build(
        total_raw_records: usize,
        duplicates_removed: usize,
        records: &[CanonicalRecord],
        region_outcomes: Vec<RegionOutcome>,
        top_n: usize,
    ) -> Self {
        let mut counts = [0usize; 5];
        let mut rating_sum = 0u64;
        let mut per_source = BTreeMap::new();
        let mut per_region = BTreeMap::new();

        for record in records {
            if let Some(rating) = record.rating {
                counts[usize::from(rating.value() - 1)] += 1;
                rating_sum += u64::from(rating.value());
            }
            *per_source.entry(record.source).or_insert(0) += 1;
            let region = record.region.clone().unwrap_or_default();
            *per_region.entry(region).or_insert(0) += 1;
        }

        let rated: usize = counts.iter().sum();
        let rating_histogram = counts
            .iter()
            .enumerate()
            .map(|(i, &count)| RatingBucket {
                rating: i as u8 + 1,
                count,
                percentage: percentage(count, rated),
            })
            .collect();

        let breakdowns = [
            top_values("app_version", records, |r| r.app_version.as_deref(), top_n),
            top_values(
                "ticket_status",
                records,
                |r| r.ticket.as_ref().and_then(|t| t.ticket_status.as_deref()),
                top_n,
            ),
        ]
        .into_iter()
        .filter(|b| !b.entries.is_empty())
        .collect();

        Self {
            generated_at: Utc::now(),
            total_raw_records,
            duplicates_removed,
            total_records: records.len(),
            rating_histogram,
            unrated_records: records.len() - rated,
            heuristic_ratings: records.iter().filter(|r| r.has_heuristic_rating()).count(),
            average_rating: (rated > 0).then(|| rating_sum as f64 / rated as f64),
            per_source,
            per_region,
            region_outcomes,
            breakdowns,
        }
    }

    pub fn outcome(&self, source: SourceKind, region: &str) -> Option<&RegionOutcome> {
        self.region_outcomes
            .iter()
            .find(|o| o.source == source && o.region.as_str() == region)
    }

    pub fn errored_regions(&self) -> usize {
        self.region_outcomes
            .iter()
            .filter(|o| matches!(o.status, RegionStatus::Errored { .. }))
            .count()
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

fn top_values<'a, F>(dimension: &str, records: &'a [CanonicalRecord], key: F, top_n: usize) -> Breakdown
where
    F: Fn(&'a CanonicalRecord) -> Option<&'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in records.iter().filter_map(key) {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut entries: Vec<DimensionCount> = counts
        .into_iter()
        .map(|(value, count)| DimensionCount {
            value: value.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    entries.truncate(top_n);
    Breakdown {
        dimension: dimension.to_string(),
        entries,
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Collection Summary ===")?;
        writeln!(f, "Raw records fetched : {}", self.total_raw_records)?;
        writeln!(f, "Duplicates removed  : {}", self.duplicates_removed)?;
        writeln!(f, "Canonical records   : {}", self.total_records)?;
        match self.average_rating {
            Some(avg) => writeln!(f, "Average rating      : {avg:.2}")?,
            None => writeln!(f, "Average rating      : n/a")?,
        }
        if self.heuristic_ratings > 0 {
            writeln!(
                f,
                "Heuristic ratings   : {} (inferred from ticket state, not user-supplied)",
                self.heuristic_ratings
            )?;
        }

        writeln!(f, "\nRating distribution:")?;
        for bucket in self.rating_histogram.iter().rev() {
            writeln!(
                f,
                "  {} star: {:>6} ({:5.1}%)",
                bucket.rating, bucket.count, bucket.percentage
            )?;
        }
        writeln!(f, "  unrated: {:>5}", self.unrated_records)?;

        writeln!(f, "\nBy source:")?;
        for (source, count) in &self.per_source {
            writeln!(f, "  {source:<12} {count}")?;
        }

        writeln!(f, "\nRegions:")?;
        for outcome in &self.region_outcomes {
            write!(
                f,
                "  {}/{:<8} {:>6} raw, {} page(s), {} ({})",
                outcome.source,
                outcome.region,
                outcome.raw_records,
                outcome.pages_fetched,
                outcome.status.label(),
                outcome.stop_reason.as_str()
            )?;
            if let RegionStatus::Errored { error } = &outcome.status {
                write!(f, ": {error}")?;
            }
            writeln!(f)?;
        }

        for breakdown in &self.breakdowns {
            writeln!(f, "\nTop {}:", breakdown.dimension)?;
            for entry in &breakdown.entries {
                writeln!(f, "  {:<20} {}", entry.value, entry.count)?;
            }
        }
        Ok(())
    }
}
