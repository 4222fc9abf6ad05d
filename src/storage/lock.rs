//! Advisory run locks shared by every process opening the same storage
//!
//! A run holds a shared lock on `{base}.lock` and an exclusive lock on
//! `{base}.{site}.lock` for each of its sites, so runs over disjoint sites
//! may proceed side by side. A reset takes `{base}.lock` exclusively, so it
//! fails while any run holds the storage. Nothing waits for a lock.
//!
//! Locks are released when the [`RunLock`] is dropped, or by the OS when
//! the holding process dies.

use crate::storage::traits::{StorageError, StorageResult};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Held lock files; unlocked on drop
#[derive(Debug)]
pub struct RunLock {
    files: Vec<File>,
}

impl RunLock {
    /// Locks the storage for a run over `sites`
    ///
    /// Fails with [`StorageError::Busy`] listing the sites another run
    /// holds, or with no sites when a reset holds the storage.
    pub fn for_sites(base: &Path, sites: &[String]) -> StorageResult<Self> {
        let storage = open_lock_file(&lock_path(base, None))?;
        if !try_lock(&storage, false)? {
            return Err(StorageError::Busy { sites: Vec::new() });
        }

        let mut files = vec![storage];
        let mut busy = Vec::new();
        for site in sites {
            let file = open_lock_file(&lock_path(base, Some(site)))?;
            if try_lock(&file, true)? {
                files.push(file);
            } else {
                busy.push(site.clone());
            }
        }

        if !busy.is_empty() {
            busy.sort();
            tracing::debug!("Sites locked by another run: {}", busy.join(", "));
            return Err(StorageError::Busy { sites: busy });
        }
        Ok(Self { files })
    }

    /// Locks the whole storage for a reset
    pub fn for_reset(base: &Path) -> StorageResult<Self> {
        let storage = open_lock_file(&lock_path(base, None))?;
        if !try_lock(&storage, true)? {
            return Err(StorageError::Busy { sites: Vec::new() });
        }
        Ok(Self { files: vec![storage] })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(e) = file.unlock() {
                tracing::warn!("Could not release run lock: {}", e);
            }
        }
    }
}

/// `{base}.lock`, or `{base}.{site}.lock`
fn lock_path(base: &Path, site: Option<&str>) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    if let Some(site) = site {
        name.push(".");
        name.push(site);
    }
    name.push(".lock");
    PathBuf::from(name)
}

fn open_lock_file(path: &Path) -> StorageResult<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

/// Takes the lock without waiting; `Ok(false)` when someone else holds it
fn try_lock(file: &File, exclusive: bool) -> StorageResult<bool> {
    let locked = if exclusive {
        FileExt::try_lock_exclusive(file)
    } else {
        FileExt::try_lock_shared(file)
    };

    match locked {
        Ok(()) => Ok(true),
        Err(e) if is_contended(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
