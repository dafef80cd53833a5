use chrono::Local;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{format, parse_content, within_days, Entry, EventStore};
use crate::config::StorageKind;
use crate::error::{NotifyError, Result};
use crate::infra::fs::{remove_if_exists, write_atomic};

/// Append-only text log.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_raw(&self) -> Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite the log keeping entries that satisfy `keep`. Deletes the file
    /// when nothing is left. Returns the number of entries removed.
    fn retain<F>(&self, keep: F) -> Result<usize>
    where
        F: Fn(&Entry) -> bool,
    {
        let _guard = self.write_lock.lock();
        let entries = parse_content(&self.read_raw()?);
        let total = entries.len();
        let kept: Vec<Entry> = entries.into_iter().filter(|e| keep(e)).collect();
        let removed = total - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        if kept.is_empty() {
            remove_if_exists(&self.path)?;
        } else {
            write_atomic(&self.path, format::render(&kept).as_bytes())?;
        }
        debug!(removed, path = %self.path.display(), "rewrote event log");
        Ok(removed)
    }
}

impl EventStore for FileStore {
    fn append(&self, entry: &Entry) -> Result<()> {
        let _guard = self.write_lock.lock();
        let write = || -> std::io::Result<()> {
            if let Some(dir) = self.path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(format::block(entry).as_bytes())
        };
        write().map_err(|e| NotifyError::LogWrite(format!("{}: {e}", self.path.display())))
    }

    fn all_entries(&self) -> Result<Vec<Entry>> {
        Ok(parse_content(&self.read_raw()?))
    }

    fn read_content(&self) -> Result<String> {
        self.read_raw()
    }

    fn clean(&self, days: u32) -> Result<usize> {
        if days == 0 {
            return Ok(0);
        }
        let today = Local::now().date_naive();
        self.retain(|e| within_days(e.local_date(), days, today))
    }

    fn remove_profile(&self, name: &str) -> Result<usize> {
        self.retain(|e| e.profile != name)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        remove_if_exists(&self.path)?;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn storage_kind(&self) -> StorageKind {
        StorageKind::File
    }
}
