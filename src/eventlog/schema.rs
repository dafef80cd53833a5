use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

/// Current schema version. Increment when adding new migrations.
const SCHEMA_VERSION: u32 = 1;

/// Apply pending migrations to `conn`.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    let current_version = get_schema_version(conn);
    if current_version >= SCHEMA_VERSION {
        debug!(version = current_version, "event log schema up to date");
        return Ok(());
    }

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    debug!(version = SCHEMA_VERSION, "event log schema migrated");
    Ok(())
}

// ---------------------------------------------------------------------------
// v1: events and their step details
// ---------------------------------------------------------------------------

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS events (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp      TEXT    NOT NULL,
            profile        TEXT    NOT NULL DEFAULT '',
            action         TEXT    NOT NULL DEFAULT '',
            kind           TEXT    NOT NULL,
            afk            INTEGER NOT NULL DEFAULT 0,
            desktop        INTEGER,
            claude_hook    TEXT    NOT NULL DEFAULT '',
            claude_message TEXT    NOT NULL DEFAULT '',
            steps_csv      TEXT    NOT NULL DEFAULT '',
            extra          TEXT    NOT NULL DEFAULT ''
        );",
    )?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS step_details (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id   INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            step_num   INTEGER NOT NULL,
            step_type  TEXT    NOT NULL,
            detail     TEXT    NOT NULL DEFAULT '',
            voice_text TEXT
        );",
    )?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp DESC);
         CREATE INDEX IF NOT EXISTS idx_events_profile_action ON events(profile, action);
         CREATE INDEX IF NOT EXISTS idx_step_details_event ON step_details(event_id);
         CREATE INDEX IF NOT EXISTS idx_step_details_voice
             ON step_details(voice_text) WHERE voice_text IS NOT NULL;",
    )?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get_schema_version(conn: &Connection) -> u32 {
    conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<u32>().unwrap_or(0))
        },
    )
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}
