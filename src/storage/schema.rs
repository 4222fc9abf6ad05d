//! Database schema definitions
//!
//! This module contains the SQL schema of the SQLite backend.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested product listings, append-only
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    price TEXT,
    original_price TEXT,
    description TEXT,
    location TEXT,
    image_urls TEXT NOT NULL,
    category TEXT NOT NULL,
    vendor_name TEXT,
    vendor_location TEXT,
    attributes TEXT NOT NULL,
    scrape_date TEXT
);

CREATE INDEX IF NOT EXISTS idx_products_site ON products(site);

-- Item URLs already processed, per site
CREATE TABLE IF NOT EXISTS seen_urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site TEXT NOT NULL,
    url TEXT NOT NULL,
    seen_at TEXT NOT NULL,
    UNIQUE(site, url)
);

-- Run log lines
CREATE TABLE IF NOT EXISTS run_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    line TEXT NOT NULL
);

-- Finished runs
CREATE TABLE IF NOT EXISTS runs (
    run_id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    config_hash TEXT,
    summary TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
