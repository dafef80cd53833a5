//! Process-wide quiet window persisted as `{"silent_until": RFC3339}`.

use chrono::{DateTime, Datelike, Duration, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::fs::{read_json_lenient, remove_if_exists, write_json_atomic};
use crate::error::{NotifyError, Result};

/// Latest year an RFC 3339 record can hold.
const MAX_YEAR: i32 = 9999;

#[derive(Debug, Serialize, Deserialize)]
struct SilentRecord {
    silent_until: String,
}

#[derive(Debug, Clone)]
pub struct SilentState {
    path: PathBuf,
}

impl SilentState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_silent(&self) -> bool {
        self.silent_until().is_some()
    }

    /// End of the active quiet window. Expired or unreadable records count
    /// as inactive.
    pub fn silent_until(&self) -> Option<DateTime<Local>> {
        self.silent_until_at(Local::now())
    }

    pub fn silent_until_at(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        let record: SilentRecord = read_json_lenient(&self.path)?;
        let until = DateTime::parse_from_rfc3339(&record.silent_until)
            .ok()?
            .with_timezone(&Local);
        (until > now).then_some(until)
    }

    /// Start a quiet window of `duration` from now. Returns its end.
    pub fn enable(&self, duration: Duration) -> Result<DateTime<Local>> {
        self.enable_at(duration, Local::now())
    }

    pub fn enable_at(&self, duration: Duration, now: DateTime<Local>) -> Result<DateTime<Local>> {
        if duration <= Duration::zero() {
            return Err(NotifyError::InvalidInput("duration must be positive".to_string()));
        }
        let until = now
            .checked_add_signed(duration)
            .filter(|t| t.year() <= MAX_YEAR)
            .ok_or_else(|| NotifyError::InvalidInput("duration too large".to_string()))?;
        write_json_atomic(
            &self.path,
            &SilentRecord {
                silent_until: until.to_rfc3339_opts(SecondsFormat::Secs, false),
            },
        )?;
        Ok(until)
    }

    pub fn disable(&self) -> Result<()> {
        remove_if_exists(&self.path)?;
        Ok(())
    }
}

/// Parse durations like `90s`, `30m`, `1h`, `1h30m`. A bare number is
/// minutes. Zero and negative values are rejected.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s.starts_with('-') {
        return Err(format!("duration must be positive: {input}"));
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        let minutes: i64 = s.parse().map_err(|_| too_large(input))?;
        if minutes == 0 {
            return Err(format!("duration must be positive: {input}"));
        }
        return Duration::try_minutes(minutes).ok_or_else(|| too_large(input));
    }

    let mut total = 0i64;
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(format!("invalid duration: {input}"));
        }
        let n: i64 = digits.parse().map_err(|_| too_large(input))?;
        digits.clear();
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(format!("invalid duration unit '{c}' in {input}")),
        };
        total = n
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| too_large(input))?;
    }
    if !digits.is_empty() {
        return Err(format!("missing unit in duration: {input}"));
    }
    if total <= 0 {
        return Err(format!("duration must be positive: {input}"));
    }
    Duration::try_seconds(total).ok_or_else(|| too_large(input))
}

fn too_large(input: &str) -> String {
    format!("duration too large: {input}")
}
