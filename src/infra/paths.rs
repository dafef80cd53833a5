use std::path::{Path, PathBuf};

use crate::config::resolve_data_dir;

/// Layout of the per-user data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `NOTIFY_DATA_DIR`, else `<platform data dir>/notify`.
    pub fn resolve() -> Self {
        Self::new(resolve_data_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("notify.log")
    }

    pub fn db_file(&self) -> PathBuf {
        self.root.join("notify.db")
    }

    pub fn cooldown_file(&self) -> PathBuf {
        self.root.join("cooldown.json")
    }

    pub fn silent_file(&self) -> PathBuf {
        self.root.join("silent.json")
    }

    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}
