//! In-run and cross-run crawl state
//!
//! - [`WalkState`] / [`WalkEnd`]: the pagination state machine of a category walk
//! - [`DedupStore`]: the per-site ledger of item URLs already processed

mod dedup;
mod walk_state;

pub use dedup::DedupStore;
pub use walk_state::{WalkEnd, WalkState};
