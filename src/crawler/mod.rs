//! Crawler module: fetching, pagination and run orchestration
//!
//! This module contains the harvest engine, including:
//! - HTTP fetching with optional bounded retry
//! - Bounded-parallel item fetching with per-item isolation
//! - The per-category pagination walk
//! - Overall run orchestration across sites

pub mod fetcher;
mod orchestrator;
mod pool;
mod walker;

pub use fetcher::{build_http_client, fetch_page, FetchResponse, Fetcher, HttpFetcher};
pub use orchestrator::Orchestrator;
pub use pool::{ConcurrentFetchPool, PoolOutcome};
pub use walker::{CategoryOutcome, PageWalker};

