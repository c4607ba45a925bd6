//! Partition keys: sources and their regions

use std::fmt;

use serde::{Deserialize, Serialize};

/// External feedback system a record was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    AppStore,
    GooglePlay,
    Zendesk,
    Trustpilot,
}

impl SourceKind {
    pub const ALL: [Self; 4] = [
        Self::AppStore,
        Self::GooglePlay,
        Self::Zendesk,
        Self::Trustpilot,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AppStore => "app_store",
            Self::GooglePlay => "google_play",
            Self::Zendesk => "zendesk",
            Self::Trustpilot => "trustpilot",
        }
    }

    /// Short prefix used in synthetic record ids.
    pub const fn short_code(self) -> &'static str {
        match self {
            Self::AppStore => "as",
            Self::GooglePlay => "gp",
            Self::Zendesk => "zd",
            Self::Trustpilot => "tp",
        }
    }

    /// Ticketing systems carry no native star rating.
    pub const fn is_ticketing(self) -> bool {
        matches!(self, Self::Zendesk)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locale or country partition of a provider's dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}
