//! Per-(profile, action) cooldown table persisted as JSON.
//!
//! Reads fail open: a missing or corrupt file means nothing is cooling down.

use chrono::{DateTime, Duration, Local, SecondsFormat};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::fs::{read_json_lenient, write_json_atomic};
use crate::config::COOLDOWN_RETENTION_SECS;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CooldownStore {
    path: PathBuf,
}

impl CooldownStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True iff the action fired within the last `seconds`.
    pub fn check(&self, profile: &str, action: &str, seconds: u64) -> bool {
        self.check_at(profile, action, seconds, Local::now())
    }

    pub fn check_at(&self, profile: &str, action: &str, seconds: u64, now: DateTime<Local>) -> bool {
        if seconds == 0 {
            return false;
        }
        let table = self.load();
        let Some(last) = table.get(&key(profile, action)).and_then(|ts| parse_ts(ts)) else {
            return false;
        };
        let window = i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        let elapsed = now.signed_duration_since(last);
        elapsed >= Duration::zero() && elapsed < window
    }

    /// Record a successful trigger now.
    pub fn record(&self, profile: &str, action: &str) -> Result<()> {
        self.record_at(profile, action, Local::now())
    }

    /// Record at `now` with millisecond precision, pruning stale and
    /// unparseable entries.
    pub fn record_at(&self, profile: &str, action: &str, now: DateTime<Local>) -> Result<()> {
        let mut table = self.load();
        let cutoff = now - Duration::seconds(COOLDOWN_RETENTION_SECS);
        let before = table.len();
        table.retain(|_, ts| parse_ts(ts).map(|t| t >= cutoff).unwrap_or(false));
        if table.len() != before {
            debug!("pruned {} cooldown entries", before - table.len());
        }

        table.insert(
            key(profile, action),
            now.to_rfc3339_opts(SecondsFormat::Millis, false),
        );
        write_json_atomic(&self.path, &table)
    }

    /// Current table, for display.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.load()
    }

    fn load(&self) -> BTreeMap<String, String> {
        read_json_lenient(&self.path).unwrap_or_default()
    }
}

fn key(profile: &str, action: &str) -> String {
    format!("{profile}/{action}")
}

fn parse_ts(ts: &str) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|t| t.with_timezone(&Local))
}
