//! The acquired-id store: which entries have already been delivered.
//!
//! Conceptually a single spreadsheet column.  [`AcquiredIdStore::load`]
//! reads the column top to bottom into a set; [`AcquiredIdStore::append`]
//! adds one row.  The store does not enforce uniqueness: the run loop checks
//! the loaded set before appending.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};

use crate::error::StoreError;

pub trait AcquiredIdStore {
    /// Every recorded id, blank cells excluded.
    fn load(&self) -> Result<HashSet<String>, StoreError>;

    /// Record `id`.  Durable once this returns `Ok`.
    fn append(&mut self, id: &str) -> Result<(), StoreError>;
}

/// Tab-separated file: the id in the first column, the time it was acquired
/// in the second.  A missing file is an empty store.
pub struct FileIdStore {
    path: PathBuf,
}

impl FileIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl AcquiredIdStore for FileIdStore {
    fn load(&self) -> Result<HashSet<String>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut ids = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| self.io_error(e))?;
            let id = line.split('\t').next().unwrap_or_default().trim();
            if !id.is_empty() {
                ids.insert(id.to_string());
            }
        }
        Ok(ids)
    }

    fn append(&mut self, id: &str) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        let acquired_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        writeln!(file, "{id}\t{acquired_at}").map_err(|e| self.io_error(e))?;
        file.sync_data().map_err(|e| self.io_error(e))
    }
}

/// In-memory store for tests.  Keeps rows in append order.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryIdStore {
    pub rows: Vec<String>,
}

#[cfg(test)]
impl AcquiredIdStore for MemoryIdStore {
    fn load(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.rows.iter().filter(|r| !r.is_empty()).cloned().collect())
    }

    fn append(&mut self, id: &str) -> Result<(), StoreError> {
        self.rows.push(id.to_string());
        Ok(())
    }
}
