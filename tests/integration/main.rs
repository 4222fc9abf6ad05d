//! Integration tests for Souk-Harvest
//!
//! `harvest_tests` drives the orchestrator against in-memory fixture sites,
//! `storage_tests` checks both backends against the same contract and
//! `crawl_tests` runs the real HTTP fetcher and built-in adapters against
//! wiremock servers.

mod common;
mod crawl_tests;
mod harvest_tests;
