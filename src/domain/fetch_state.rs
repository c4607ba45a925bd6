//! Per-region pagination state machine
//!
//! `Fetching → Waiting → Fetching | Done(reason)`. The transition into
//! `Done` happens exactly once; later transition requests are ignored.

use serde::{Deserialize, Serialize};

/// Consecutive empty pages after which a region is considered exhausted.
pub const EMPTY_PAGE_LIMIT: u32 = 2;

/// What the provider says about the page after the one just returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Page-index pagination: ask for `page_index + 1`.
    Index,
    /// Cursor pagination: pass this token next time.
    Cursor(String),
    /// The provider has nothing further.
    End,
}

/// Why a region stopped paginating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EmptyPages,
    ShortPage,
    CursorExhausted,
    PageCeiling,
    GlobalPageCeiling,
    ProviderFailure,
    Cancelled,
}

impl StopReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyPages => "empty_pages",
            Self::ShortPage => "short_page",
            Self::CursorExhausted => "cursor_exhausted",
            Self::PageCeiling => "page_ceiling",
            Self::GlobalPageCeiling => "global_page_ceiling",
            Self::ProviderFailure => "provider_failure",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Fetching,
    Waiting,
    Done(StopReason),
}

/// Termination thresholds for one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub max_pages: u32,
    /// A non-empty page with fewer records than this ends pagination. `0` disables.
    pub min_page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchState {
    page_index: u32,
    cursor: Option<String>,
    consecutive_empty_pages: u32,
    pages_fetched: u32,
    phase: FetchPhase,
}

impl Default for FetchState {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchState {
    pub const fn new() -> Self {
        Self {
            page_index: 1,
            cursor: None,
            consecutive_empty_pages: 0,
            pages_fetched: 0,
            phase: FetchPhase::Fetching,
        }
    }

    pub const fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub const fn consecutive_empty_pages(&self) -> u32 {
        self.consecutive_empty_pages
    }

    pub const fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub const fn phase(&self) -> FetchPhase {
        self.phase
    }

    pub const fn is_done(&self) -> bool {
        matches!(self.phase, FetchPhase::Done(_))
    }

    pub const fn stop_reason(&self) -> Option<StopReason> {
        match self.phase {
            FetchPhase::Done(reason) => Some(reason),
            _ => None,
        }
    }

    /// True while another request may be issued.
    pub const fn can_fetch(&self, limits: &FetchLimits) -> bool {
        matches!(self.phase, FetchPhase::Fetching) && self.page_index <= limits.max_pages
    }

    /// Apply a successful page of `count` records.
    pub fn record_page(&mut self, count: usize, next: NextPage, limits: &FetchLimits) -> FetchPhase {
        if self.is_done() {
            return self.phase;
        }

        self.pages_fetched += 1;
        self.page_index += 1;
        let exhausted = matches!(next, NextPage::End);
        match next {
            NextPage::Cursor(token) => self.cursor = Some(token),
            NextPage::End => self.cursor = None,
            NextPage::Index => {}
        }

        if count > 0 {
            self.consecutive_empty_pages = 0;
            if count < limits.min_page_size {
                self.finish(StopReason::ShortPage);
            }
        } else {
            self.consecutive_empty_pages += 1;
            if self.consecutive_empty_pages >= EMPTY_PAGE_LIMIT {
                self.finish(StopReason::EmptyPages);
            }
        }

        if exhausted {
            self.finish(StopReason::CursorExhausted);
        }
        if self.page_index > limits.max_pages {
            self.finish(StopReason::PageCeiling);
        }
        if !self.is_done() {
            self.phase = FetchPhase::Waiting;
        }
        self.phase
    }

    /// Provider failure: no retry within this region.
    pub fn record_failure(&mut self) {
        self.finish(StopReason::ProviderFailure);
    }

    /// Leave the waiting phase once the inter-page delay elapsed.
    pub fn resume(&mut self) {
        if self.phase == FetchPhase::Waiting {
            self.phase = FetchPhase::Fetching;
        }
    }

    pub fn finish(&mut self, reason: StopReason) {
        if !self.is_done() {
            self.phase = FetchPhase::Done(reason);
        }
    }
}
