//! Both event log backends agree on what they store and how it reads back.

use chrono::{Duration, Local};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

use devnotify::config::{Step, StepKind, StorageKind};
use devnotify::eventlog::{
    open_store, parse_content, summarize_by_day, time_spent, Entry, EntryKind, EventStore,
};
use devnotify::infra::paths::DataPaths;
use devnotify::template::TemplateVars;

fn vars(profile: &str) -> TemplateVars {
    TemplateVars {
        profile: profile.to_string(),
        ..Default::default()
    }
}

fn fill(store: &dyn EventStore) {
    let now = Local::now();
    let steps = [Step::sound("blip"), Step::with_text(StepKind::Say, "{Profile} done")];

    let mut claude = vars("boss");
    claude.claude_hook = "Stop".into();
    claude.claude_message = "all\ngreen".into();

    store
        .append(&Entry::execution(now - Duration::days(10), "done", &steps, false, &vars("boss"), None))
        .unwrap();
    store
        .append(&Entry::cooldown_recorded(now - Duration::minutes(5), "boss", "done", 60))
        .unwrap();
    store
        .append(&Entry::execution(now - Duration::minutes(5), "done", &steps, true, &claude, Some(2)))
        .unwrap();
    store
        .append(&Entry::cooldown_skipped(now - Duration::minutes(4), "boss", "done", 60))
        .unwrap();
    store.append(&Entry::silent_enabled(now - Duration::minutes(3), "30m")).unwrap();
    store
        .append(&Entry::silent_skipped(now - Duration::minutes(2), "work", "build"))
        .unwrap();
    store.append(&Entry::silent_disabled(now - Duration::minutes(1))).unwrap();
    store
        .append(&Entry::execution(now, "build", &steps, false, &vars("work"), None))
        .unwrap();
}

fn open(kind: StorageKind) -> (TempDir, Arc<dyn EventStore>) {
    let dir = TempDir::new().unwrap();
    let paths = DataPaths::new(dir.path());
    paths.ensure().unwrap();
    let store = open_store(kind, &paths).unwrap();
    (dir, store)
}

#[test]
fn rendered_content_parses_back_to_stored_entries() {
    for kind in [StorageKind::File, StorageKind::Sqlite] {
        let (_dir, store) = open(kind);
        fill(store.as_ref());

        let stored = store.all_entries().unwrap();
        assert_eq!(stored.len(), 8, "{kind:?}");
        assert_eq!(parse_content(&store.read_content().unwrap()), stored, "{kind:?}");
    }
}

#[test]
fn backends_agree() {
    let (_a, file) = open(StorageKind::File);
    let (_b, sqlite) = open(StorageKind::Sqlite);
    fill(file.as_ref());
    fill(sqlite.as_ref());

    let from_file = file.all_entries().unwrap();
    assert_eq!(from_file, sqlite.all_entries().unwrap());
    assert_eq!(file.voice_lines(0).unwrap(), sqlite.voice_lines(0).unwrap());
    assert_eq!(file.entries(1).unwrap(), sqlite.entries(1).unwrap());

    let execution = &from_file[2];
    assert_eq!(execution.kind, EntryKind::Execution);
    assert!(execution.afk);
    assert_eq!(execution.desktop, Some(2));
    assert_eq!(execution.claude_hook, "Stop");
    assert_eq!(execution.claude_message, "all green");
    assert_eq!(execution.details[1].voice_text.as_deref(), Some("Boss done"));
}

#[test]
fn summaries_only_count_attributed_entries() {
    let (_dir, store) = open(StorageKind::File);
    fill(store.as_ref());

    let entries = store.entries(1).unwrap();
    assert!(entries.iter().all(Entry::is_attributed));

    let days = summarize_by_day(&entries, 1);
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].executions, 2);
    assert_eq!(days[0].skipped, 2);

    let lines = store.voice_lines(0).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].text, "Boss done");
    assert_eq!(lines[0].count, 2);
    assert_eq!(lines[1].text, "Work done");

    let spent = time_spent(&store.entries(0).unwrap());
    assert!(spent.total_seconds > 0);
}

#[test]
fn clean_and_remove_profile_match_across_backends() {
    for kind in [StorageKind::File, StorageKind::Sqlite] {
        let (_dir, store) = open(kind);
        fill(store.as_ref());

        assert_eq!(store.clean(0).unwrap(), 0, "{kind:?}");
        assert_eq!(store.clean(3).unwrap(), 1, "{kind:?}");
        assert_eq!(store.remove_profile("work").unwrap(), 2, "{kind:?}");

        let left: Vec<EntryKind> = store.entries(0).unwrap().into_iter().map(|e| e.kind).collect();
        assert_eq!(
            left,
            vec![EntryKind::CooldownRecorded, EntryKind::Execution, EntryKind::CooldownSkipped],
            "{kind:?}"
        );

        store.clear().unwrap();
        assert!(store.all_entries().unwrap().is_empty(), "{kind:?}");
    }
}

#[test]
fn sqlite_imports_legacy_text_log() {
    let dir = TempDir::new().unwrap();
    let paths = DataPaths::new(dir.path());
    paths.ensure().unwrap();

    let file = open_store(StorageKind::File, &paths).unwrap();
    fill(file.as_ref());
    let expected = file.all_entries().unwrap();
    drop(file);

    let sqlite = open_store(StorageKind::Sqlite, &paths).unwrap();
    assert_eq!(sqlite.all_entries().unwrap(), expected);
    assert!(!paths.log_file().exists());

    let mut migrated = paths.log_file().into_os_string();
    migrated.push(".migrated");
    assert!(std::path::PathBuf::from(migrated).exists());

    // A second open finds nothing left to import.
    drop(sqlite);
    let again = open_store(StorageKind::Sqlite, &paths).unwrap();
    assert_eq!(again.all_entries().unwrap().len(), expected.len());
}
