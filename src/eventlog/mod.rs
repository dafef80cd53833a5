//! Event log of executions and skips.
//!
//! Two interchangeable backends sit behind [`EventStore`]: an append-only
//! text file and a SQLite database. Both can render the same text format
//! through `read_content`, which is what `history` and the dashboard consume.

pub mod breakdown;
pub mod file_store;
pub mod format;
pub mod parser;
mod schema;
pub mod sqlite_store;
pub mod summary;

pub use breakdown::{breakdown, Breakdown, BreakdownBucket, RangeKind};
pub use file_store::FileStore;
pub use parser::parse_content;
pub use sqlite_store::SqliteStore;
pub use summary::{summarize_by_day, time_spent, voice_lines, ActionSummary, DaySummary, TimeSpent, VoiceLine};

use chrono::{DateTime, Local, NaiveDate, SubsecRound};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::config::{Step, StorageKind};
use crate::error::Result;
use crate::infra::paths::DataPaths;
use crate::runner::expand_step;
use crate::template::TemplateVars;

// ============================================================================
// Entries
// ============================================================================

/// What a log line records.
///
/// Only `Execution`, `CooldownSkipped` and `SilentSkipped` count in
/// summaries; the rest are informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Execution,
    CooldownSkipped,
    SilentSkipped,
    CooldownRecorded,
    SilentEnabled,
    SilentDisabled,
    Other,
}

impl EntryKind {
    pub const ALL: [EntryKind; 7] = [
        EntryKind::Execution,
        EntryKind::CooldownSkipped,
        EntryKind::SilentSkipped,
        EntryKind::CooldownRecorded,
        EntryKind::SilentEnabled,
        EntryKind::SilentDisabled,
        EntryKind::Other,
    ];

    /// Value of the SQLite `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Execution => "execution",
            EntryKind::CooldownSkipped => "cooldown_skipped",
            EntryKind::SilentSkipped => "silent_skipped",
            EntryKind::CooldownRecorded => "cooldown_recorded",
            EntryKind::SilentEnabled => "silent_enabled",
            EntryKind::SilentDisabled => "silent_disabled",
            EntryKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> EntryKind {
        EntryKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .unwrap_or(EntryKind::Other)
    }

    pub fn is_counted(&self) -> bool {
        matches!(
            self,
            EntryKind::Execution | EntryKind::CooldownSkipped | EntryKind::SilentSkipped
        )
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, EntryKind::CooldownSkipped | EntryKind::SilentSkipped)
    }
}

/// One executed step as recorded in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDetail {
    /// 1-based position in the executed step list.
    pub index: usize,
    pub step_type: String,
    pub detail: String,
    /// Spoken text for voice-carrying step types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub timestamp: DateTime<Local>,
    pub profile: String,
    pub action: String,
    pub kind: EntryKind,
    #[serde(default)]
    pub afk: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub claude_hook: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub claude_message: String,
    /// Step types of an execution, in order.
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub details: Vec<StepDetail>,
    /// Parenthesised value (`60s`, `30m`) or, for `Other`, the raw line tail.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extra: String,
}

impl Entry {
    fn bare(timestamp: DateTime<Local>, profile: &str, action: &str, kind: EntryKind) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            profile: profile.to_string(),
            action: action.to_string(),
            kind,
            afk: false,
            desktop: None,
            claude_hook: String::new(),
            claude_message: String::new(),
            steps: Vec::new(),
            details: Vec::new(),
            extra: String::new(),
        }
    }

    /// Execution of `steps` (the filtered list, as configured).
    pub fn execution(
        now: DateTime<Local>,
        action: &str,
        steps: &[Step],
        afk: bool,
        vars: &TemplateVars,
        desktop: Option<u32>,
    ) -> Self {
        let details = steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let expanded = expand_step(step, vars);
                StepDetail {
                    index: i + 1,
                    step_type: step.step_type.clone(),
                    detail: format::step_detail(&expanded),
                    voice_text: format::voice_text(&expanded),
                }
            })
            .collect();
        Self {
            afk,
            desktop,
            claude_hook: vars.claude_hook.clone(),
            claude_message: format::single_line(&vars.claude_message),
            steps: steps.iter().map(|s| s.step_type.clone()).collect(),
            details,
            ..Self::bare(now, &vars.profile, action, EntryKind::Execution)
        }
    }

    pub fn cooldown_skipped(now: DateTime<Local>, profile: &str, action: &str, seconds: u64) -> Self {
        Self {
            extra: format!("{seconds}s"),
            ..Self::bare(now, profile, action, EntryKind::CooldownSkipped)
        }
    }

    pub fn cooldown_recorded(now: DateTime<Local>, profile: &str, action: &str, seconds: u64) -> Self {
        Self {
            extra: format!("{seconds}s"),
            ..Self::bare(now, profile, action, EntryKind::CooldownRecorded)
        }
    }

    pub fn silent_skipped(now: DateTime<Local>, profile: &str, action: &str) -> Self {
        Self::bare(now, profile, action, EntryKind::SilentSkipped)
    }

    pub fn silent_enabled(now: DateTime<Local>, duration: &str) -> Self {
        Self {
            extra: duration.to_string(),
            ..Self::bare(now, "", "", EntryKind::SilentEnabled)
        }
    }

    pub fn silent_disabled(now: DateTime<Local>) -> Self {
        Self::bare(now, "", "", EntryKind::SilentDisabled)
    }

    /// Entries with both profile and action; silent toggles are dropped.
    pub fn is_attributed(&self) -> bool {
        !self.profile.is_empty() && !self.action.is_empty()
    }

    pub fn local_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Whether `date` falls within the last `days` calendar days ending `today`.
/// `days == 0`, or a window reaching past the calendar, means no limit.
pub fn within_days(date: NaiveDate, days: u32, today: NaiveDate) -> bool {
    if days == 0 {
        return true;
    }
    match today.checked_sub_signed(chrono::Duration::days(i64::from(days) - 1)) {
        Some(first) => date >= first,
        None => true,
    }
}

// ============================================================================
// Store
// ============================================================================

/// Storage-agnostic event log.
///
/// Writers go through [`EventStore::append`]; the `log_*` helpers build the
/// entry for the current time.
pub trait EventStore: Send + Sync {
    fn append(&self, entry: &Entry) -> Result<()>;

    /// Every parsed entry in insertion order, including silent toggles.
    fn all_entries(&self) -> Result<Vec<Entry>>;

    /// Raw text rendering of the whole log.
    fn read_content(&self) -> Result<String>;

    /// Remove entries older than `days` calendar days (0 keeps everything).
    /// Returns the count removed.
    fn clean(&self, days: u32) -> Result<usize>;

    fn remove_profile(&self, name: &str) -> Result<usize>;

    fn clear(&self) -> Result<()>;

    fn path(&self) -> &Path;

    fn storage_kind(&self) -> StorageKind;

    fn size_bytes(&self) -> u64 {
        std::fs::metadata(self.path()).map(|m| m.len()).unwrap_or(0)
    }

    fn log(
        &self,
        action: &str,
        steps: &[Step],
        afk: bool,
        vars: &TemplateVars,
        desktop: Option<u32>,
    ) -> Result<()> {
        self.append(&Entry::execution(Local::now(), action, steps, afk, vars, desktop))
    }

    fn log_cooldown(&self, profile: &str, action: &str, seconds: u64) -> Result<()> {
        self.append(&Entry::cooldown_skipped(Local::now(), profile, action, seconds))
    }

    fn log_cooldown_record(&self, profile: &str, action: &str, seconds: u64) -> Result<()> {
        self.append(&Entry::cooldown_recorded(Local::now(), profile, action, seconds))
    }

    fn log_silent(&self, profile: &str, action: &str) -> Result<()> {
        self.append(&Entry::silent_skipped(Local::now(), profile, action))
    }

    fn log_silent_enable(&self, duration: &str) -> Result<()> {
        self.append(&Entry::silent_enabled(Local::now(), duration))
    }

    fn log_silent_disable(&self) -> Result<()> {
        self.append(&Entry::silent_disabled(Local::now()))
    }

    /// Attributed entries within the last `days` days (0 = all).
    fn entries(&self, days: u32) -> Result<Vec<Entry>> {
        let today = Local::now().date_naive();
        Ok(self
            .all_entries()?
            .into_iter()
            .filter(|e| e.is_attributed() && within_days(e.local_date(), days, today))
            .collect())
    }

    fn entries_since(&self, cutoff: DateTime<Local>) -> Result<Vec<Entry>> {
        Ok(self
            .all_entries()?
            .into_iter()
            .filter(|e| e.is_attributed() && e.timestamp >= cutoff)
            .collect())
    }

    fn voice_lines(&self, days: u32) -> Result<Vec<VoiceLine>> {
        Ok(voice_lines(&self.entries(days)?))
    }
}

/// Open the configured backend under `paths`.
pub fn open_store(kind: StorageKind, paths: &DataPaths) -> Result<Arc<dyn EventStore>> {
    Ok(match kind {
        StorageKind::File => Arc::new(FileStore::new(paths.log_file())),
        StorageKind::Sqlite => Arc::new(SqliteStore::open(&paths.db_file(), &paths.log_file())?),
    })
}
