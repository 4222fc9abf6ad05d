//! Pagination states of a category walk
//!
//! A walk starts in `Fetching` at page 1. Each listing page moves it to one
//! of the result states; the result state plus the site's pagination policy
//! decide whether the walk advances or ends.

use crate::adapters::PaginationPolicy;
use std::fmt;

/// Where a category walk stands after fetching a listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalkState {
    /// A listing page request is in flight
    Fetching,

    /// The page listed at least one item not seen before
    HasNewItems,

    /// Every item on the page was already seen
    HasOnlyDuplicates,

    /// The page listed no items; no more pages
    Empty,

    /// The page could not be fetched
    Failed,
}

/// Why a category walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalkEnd {
    /// An empty page was reached
    Exhausted,

    /// A page of duplicates ended the walk under a stop policy
    AllDuplicates,

    /// The page cap was reached first
    PageCap,

    /// A listing page fetch failed
    Failed,

    /// The run was cancelled between pages
    Cancelled,
}

impl WalkState {
    /// Classifies a fetched listing page by how many of its items are new
    pub fn after_listing(listed: usize, new: usize) -> Self {
        match (listed, new) {
            (0, _) => Self::Empty,
            (_, 0) => Self::HasOnlyDuplicates,
            _ => Self::HasNewItems,
        }
    }

    /// Returns the end reason if this state stops the walk under `policy`
    pub fn end_reason(&self, policy: &PaginationPolicy) -> Option<WalkEnd> {
        match self {
            Self::Fetching | Self::HasNewItems => None,
            Self::HasOnlyDuplicates if policy.stop_on_duplicates => Some(WalkEnd::AllDuplicates),
            Self::HasOnlyDuplicates => None,
            Self::Empty => Some(WalkEnd::Exhausted),
            Self::Failed => Some(WalkEnd::Failed),
        }
    }

    /// Returns true if the listing page dispatches work to the fetch pool
    pub fn dispatches_items(&self) -> bool {
        matches!(self, Self::HasNewItems)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::HasNewItems => "has_new_items",
            Self::HasOnlyDuplicates => "has_only_duplicates",
            Self::Empty => "empty",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WalkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WalkEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::AllDuplicates => "all_duplicates",
            Self::PageCap => "page_cap",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WalkEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
