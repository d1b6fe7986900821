use crate::url_builder::is_canonical_host;
use iapd_core::SearchResultEntry;
use serde::{Deserialize, Serialize};

/// Post-filter applied to each parsed results page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultFilter {
    #[default]
    All,
    /// Keep only entries whose profile lives on adviserinfo.sec.gov
    CanonicalHostOnly,
}

impl ResultFilter {
    pub fn from_flag(canonical_host_only: bool) -> Self {
        if canonical_host_only {
            Self::CanonicalHostOnly
        } else {
            Self::All
        }
    }

    pub fn matches(&self, entry: &SearchResultEntry) -> bool {
        match self {
            Self::All => true,
            Self::CanonicalHostOnly => is_canonical_host(&entry.url),
        }
    }

    /// Drop non-matching entries, keeping page order.
    pub fn apply(&self, entries: Vec<SearchResultEntry>) -> Vec<SearchResultEntry> {
        match self {
            Self::All => entries,
            Self::CanonicalHostOnly => entries.into_iter().filter(|e| self.matches(e)).collect(),
        }
    }
}
