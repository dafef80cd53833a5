use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Transaction};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{format, parse_content, schema, within_days, Entry, EntryKind, EventStore, StepDetail, VoiceLine};
use crate::config::StorageKind;
use crate::error::Result;

/// SQLite-backed event log.
///
/// Opening the store imports a legacy text log found next to it in one
/// transaction, then renames that file with a `.migrated` suffix.
pub struct SqliteStore {
    path: PathBuf,
    db: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path, legacy_log: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut conn = Connection::open(db_path)?;
        schema::run_migrations(&conn)?;

        if legacy_log.is_file() {
            let imported = migrate_from_file(&mut conn, legacy_log)?;
            let mut renamed = legacy_log.as_os_str().to_owned();
            renamed.push(".migrated");
            std::fs::rename(legacy_log, PathBuf::from(renamed))?;
            info!(imported, from = %legacy_log.display(), "imported text event log");
        }

        Ok(Self {
            path: db_path.to_path_buf(),
            db: Mutex::new(conn),
        })
    }

    fn delete_ids(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM events WHERE id = ?1")?;
            for id in ids {
                stmt.execute([id])?;
            }
        }
        tx.commit()?;
        Ok(ids.len())
    }

    fn timestamps(&self) -> Result<Vec<(i64, DateTime<Local>)>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare("SELECT id, timestamp FROM events ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            let (id, ts) = row?;
            if let Some(ts) = parse_ts(&ts) {
                out.push((id, ts));
            }
        }
        Ok(out)
    }
}

fn parse_ts(s: &str) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Local))
}

fn insert_entry(tx: &Transaction<'_>, entry: &Entry) -> Result<()> {
    tx.execute(
        "INSERT INTO events (timestamp, profile, action, kind, afk, desktop,
                             claude_hook, claude_message, steps_csv, extra)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            format::timestamp(&entry.timestamp),
            entry.profile,
            entry.action,
            entry.kind.as_str(),
            entry.afk,
            entry.desktop,
            entry.claude_hook,
            entry.claude_message,
            entry.steps.join(","),
            entry.extra,
        ],
    )?;
    let event_id = tx.last_insert_rowid();
    let mut stmt = tx.prepare_cached(
        "INSERT INTO step_details (event_id, step_num, step_type, detail, voice_text)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for d in &entry.details {
        stmt.execute(params![event_id, d.index as i64, d.step_type, d.detail, d.voice_text])?;
    }
    Ok(())
}

/// Import every entry of a text log in a single transaction.
fn migrate_from_file(conn: &mut Connection, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)?;
    let entries = parse_content(&content);
    let tx = conn.transaction()?;
    for entry in &entries {
        insert_entry(&tx, entry)?;
    }
    tx.commit()?;
    Ok(entries.len())
}

impl EventStore for SqliteStore {
    fn append(&self, entry: &Entry) -> Result<()> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        insert_entry(&tx, entry)?;
        tx.commit()?;
        Ok(())
    }

    fn all_entries(&self) -> Result<Vec<Entry>> {
        let conn = self.db.lock();

        let mut details: HashMap<i64, Vec<StepDetail>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT event_id, step_num, step_type, detail, voice_text
                 FROM step_details ORDER BY event_id, step_num",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    StepDetail {
                        index: row.get::<_, i64>(1)?.max(0) as usize,
                        step_type: row.get(2)?,
                        detail: row.get(3)?,
                        voice_text: row.get(4)?,
                    },
                ))
            })?;
            for row in rows {
                let (event_id, detail) = row?;
                details.entry(event_id).or_default().push(detail);
            }
        }

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, profile, action, kind, afk, desktop,
                    claude_hook, claude_message, steps_csv, extra
             FROM events ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                Entry {
                    timestamp: Local::now(),
                    profile: row.get(2)?,
                    action: row.get(3)?,
                    kind: EntryKind::parse(&row.get::<_, String>(4)?),
                    afk: row.get(5)?,
                    desktop: row.get(6)?,
                    claude_hook: row.get(7)?,
                    claude_message: row.get(8)?,
                    steps: row
                        .get::<_, String>(9)?
                        .split(',')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                    details: Vec::new(),
                    extra: row.get(10)?,
                },
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, ts, mut entry) = row?;
            let Some(ts) = parse_ts(&ts) else {
                debug!(id, "skipping event with unparseable timestamp");
                continue;
            };
            entry.timestamp = ts;
            entry.details = details.remove(&id).unwrap_or_default();
            entries.push(entry);
        }
        Ok(entries)
    }

    fn read_content(&self) -> Result<String> {
        Ok(format::render(&self.all_entries()?))
    }

    fn clean(&self, days: u32) -> Result<usize> {
        if days == 0 {
            return Ok(0);
        }
        let today = Local::now().date_naive();
        let stale: Vec<i64> = self
            .timestamps()?
            .into_iter()
            .filter(|(_, ts)| !within_days(ts.date_naive(), days, today))
            .map(|(id, _)| id)
            .collect();
        self.delete_ids(&stale)
    }

    fn remove_profile(&self, name: &str) -> Result<usize> {
        let conn = self.db.lock();
        Ok(conn.execute("DELETE FROM events WHERE profile = ?1", [name])?)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM events", [])?;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn storage_kind(&self) -> StorageKind {
        StorageKind::Sqlite
    }

    fn voice_lines(&self, days: u32) -> Result<Vec<VoiceLine>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT d.voice_text, e.timestamp
             FROM step_details d JOIN events e ON e.id = d.event_id
             WHERE d.voice_text IS NOT NULL AND e.profile != '' AND e.action != ''",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let today = Local::now().date_naive();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for row in rows {
            let (text, ts) = row?;
            let in_window = parse_ts(&ts)
                .map(|t| within_days(t.date_naive(), days, today))
                .unwrap_or(false);
            if in_window {
                *counts.entry(text).or_default() += 1;
            }
        }
        Ok(super::summary::sort_voice_lines(counts))
    }
}
