//! Flat-file storage backend
//!
//! Layout under the output directory:
//!
//! | File | Contents |
//! |------|----------|
//! | `scraped_data.csv` | dataset, one row per record, header written once |
//! | `urls_file.txt` | seen ledger, one `site<TAB>url` line per entry |
//! | `log_file.txt` | run log, one line per event |
//! | `runs.jsonl` | finished runs, one JSON object per line |

use crate::model::ProductRecord;
use crate::output::RunRecord;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

const DATASET_FILE: &str = "scraped_data.csv";
const LEDGER_FILE: &str = "urls_file.txt";
const LOG_FILE: &str = "log_file.txt";
const RUNS_FILE: &str = "runs.jsonl";

/// Separator between image URLs inside one CSV cell
const IMAGE_SEPARATOR: &str = " | ";

/// Storage backed by plain files in one directory
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

/// Flat CSV shape of a [`ProductRecord`]
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    site: String,
    url: String,
    title: String,
    price: Option<String>,
    original_price: Option<String>,
    description: Option<String>,
    location: Option<String>,
    image_urls: String,
    category: String,
    vendor_name: Option<String>,
    vendor_location: Option<String>,
    attributes: String,
    scrape_date: Option<String>,
}

impl CsvRow {
    fn from_record(record: &ProductRecord) -> StorageResult<Self> {
        Ok(Self {
            site: record.site.clone(),
            url: record.url.clone(),
            title: record.title.clone(),
            price: record.price.clone(),
            original_price: record.original_price.clone(),
            description: record.description.clone(),
            location: record.location.clone(),
            image_urls: record.image_urls.join(IMAGE_SEPARATOR),
            category: record.category.clone(),
            vendor_name: record.vendor_name.clone(),
            vendor_location: record.vendor_location.clone(),
            attributes: serde_json::to_string(&record.attributes)?,
            scrape_date: record.scrape_date.clone(),
        })
    }

    fn into_record(self) -> StorageResult<ProductRecord> {
        let image_urls = if self.image_urls.is_empty() {
            Vec::new()
        } else {
            self.image_urls
                .split(IMAGE_SEPARATOR)
                .map(str::to_string)
                .collect()
        };
        let attributes: BTreeMap<String, String> = if self.attributes.is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&self.attributes)?
        };

        Ok(ProductRecord {
            site: self.site,
            url: self.url,
            title: self.title,
            price: self.price,
            original_price: self.original_price,
            description: self.description,
            location: self.location,
            image_urls,
            category: self.category,
            vendor_name: self.vendor_name,
            vendor_location: self.vendor_location,
            attributes,
            scrape_date: self.scrape_date,
        })
    }
}

impl FileStorage {
    /// Opens (creating if needed) the storage directory
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Directory holding the files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the CSV dataset
    pub fn dataset_path(&self) -> PathBuf {
        self.dir.join(DATASET_FILE)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn append_handle(&self, name: &str) -> StorageResult<File> {
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name))?)
    }

    /// Lines of a file, or nothing if the file does not exist yet
    fn read_lines(&self, name: &str) -> StorageResult<Vec<String>> {
        let file = match File::open(self.path(name)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    fn seen_for_site(&self, site: &str) -> StorageResult<HashSet<String>> {
        Ok(self
            .load_seen()?
            .into_iter()
            .filter(|(s, _)| s == site)
            .map(|(_, url)| url)
            .collect())
    }
}

impl Storage for FileStorage {
    fn load_seen(&self) -> StorageResult<Vec<(String, String)>> {
        let mut entries = Vec::new();
        for line in self.read_lines(LEDGER_FILE)? {
            let (site, url) = line.split_once('\t').ok_or_else(|| StorageError::Corrupt {
                file: LEDGER_FILE.to_string(),
                message: format!("missing tab in line '{}'", line),
            })?;
            entries.push((site.to_string(), url.to_string()));
        }
        Ok(entries)
    }

    fn append_seen(&mut self, site: &str, urls: &[String]) -> StorageResult<usize> {
        if urls.is_empty() {
            return Ok(0);
        }

        let mut known = self.seen_for_site(site)?;
        let mut batch = String::new();
        let mut written = 0;
        for url in urls {
            if url.contains(['\t', '\n']) {
                tracing::warn!("Not recording URL with control characters: {:?}", url);
                continue;
            }
            if known.insert(url.clone()) {
                batch.push_str(site);
                batch.push('\t');
                batch.push_str(url);
                batch.push('\n');
                written += 1;
            }
        }

        // One write per batch keeps lines whole in a shared file
        if written > 0 {
            let mut file = self.append_handle(LEDGER_FILE)?;
            file.write_all(batch.as_bytes())?;
        }
        Ok(written)
    }

    fn append_records(&mut self, records: &[ProductRecord]) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let path = self.dataset_path();
        let needs_header = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(Vec::new());
        for record in records {
            writer.serialize(CsvRow::from_record(record)?)?;
        }
        let batch = writer
            .into_inner()
            .map_err(|e| StorageError::Io(e.into_error()))?;

        let mut file = self.append_handle(DATASET_FILE)?;
        file.write_all(&batch)?;
        Ok(())
    }

    fn load_records(&self) -> StorageResult<Vec<ProductRecord>> {
        let file = match File::open(self.dataset_path()) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::Reader::from_reader(file);
        let mut records = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn append_log(&mut self, line: &str) -> StorageResult<()> {
        let mut file = self.append_handle(LOG_FILE)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn read_log(&self) -> StorageResult<Vec<String>> {
        self.read_lines(LOG_FILE)
    }

    fn record_run(&mut self, run: &RunRecord) -> StorageResult<()> {
        if self.load_runs()?.iter().any(|r| r.run_id == run.run_id) {
            return Err(StorageError::DuplicateRun {
                run_id: run.run_id.clone(),
            });
        }

        let mut line = serde_json::to_string(run)?;
        line.push('\n');
        let mut file = self.append_handle(RUNS_FILE)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn load_runs(&self) -> StorageResult<Vec<RunRecord>> {
        self.read_lines(RUNS_FILE)?
            .iter()
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }

    fn lock_base(&self) -> Option<PathBuf> {
        Some(self.dir.join("harvest"))
    }

    fn reset(&mut self) -> StorageResult<()> {
        for name in [DATASET_FILE, LEDGER_FILE, LOG_FILE, RUNS_FILE] {
            match fs::remove_file(self.path(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
