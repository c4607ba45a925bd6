//! Canonical feedback record shared by every source

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::region::SourceKind;

/// Star rating guaranteed to lie in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Accepts only values already inside the valid range.
    pub fn new(value: i64) -> Option<Self> {
        (i64::from(Self::MIN)..=i64::from(Self::MAX))
            .contains(&value)
            .then(|| Self(value as u8))
    }

    /// Forces any score into range.
    pub fn clamped(value: i32) -> Self {
        Self(value.clamp(i32::from(Self::MIN), i32::from(Self::MAX)) as u8)
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(i64::from(value)).ok_or_else(|| format!("rating {value} outside 1..=5"))
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a rating value came from.
///
/// `Heuristic` ratings are a proxy inferred from ticket status and priority.
/// They are not user-supplied and should be kept apart in analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingOrigin {
    Reported,
    SatisfactionSurvey,
    Heuristic,
}

impl RatingOrigin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reported => "reported",
            Self::SatisfactionSurvey => "satisfaction_survey",
            Self::Heuristic => "heuristic",
        }
    }
}

/// Ticket-only extension fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketExtension {
    pub ticket_id: Option<u64>,
    pub ticket_status: Option<String>,
    pub ticket_priority: Option<String>,
    /// Always serialized; its presence marks a flattened ticket on read-back.
    pub ticket_tags: Vec<String>,
}

/// Normalized record written to every output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub author: String,
    pub rating: Option<Rating>,
    pub rating_origin: Option<RatingOrigin>,
    pub body: String,
    pub title: Option<String>,
    /// `YYYY-MM-DD`, or empty when the source date was missing or unparseable.
    pub date: String,
    pub helpful_count: u64,
    pub source: SourceKind,
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(flatten)]
    pub ticket: Option<TicketExtension>,
}

impl CanonicalRecord {
    pub fn has_heuristic_rating(&self) -> bool {
        self.rating_origin == Some(RatingOrigin::Heuristic)
    }
}
