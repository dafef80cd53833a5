//! Aggregations over parsed entries: per-day summaries, approximate active
//! time and voice-line frequency.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::{within_days, Entry, EntryKind};
use crate::config::{StepKind, ACTIVE_GAP_SECS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSummary {
    pub profile: String,
    pub action: String,
    pub executions: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub executions: usize,
    pub skipped: usize,
    /// Sorted by `profile/action`.
    pub summaries: Vec<ActionSummary>,
}

/// Group counted entries by local date, then by `(profile, action)`.
/// Days are newest first.
pub fn summarize_by_day(entries: &[Entry], days: u32) -> Vec<DaySummary> {
    summarize_by_day_at(entries, days, Local::now().date_naive())
}

pub fn summarize_by_day_at(entries: &[Entry], days: u32, today: NaiveDate) -> Vec<DaySummary> {
    let mut grouped: BTreeMap<NaiveDate, BTreeMap<(String, String), (usize, usize)>> = BTreeMap::new();
    for e in entries {
        if !e.kind.is_counted() || !within_days(e.local_date(), days, today) {
            continue;
        }
        let counts = grouped
            .entry(e.local_date())
            .or_default()
            .entry((e.profile.clone(), e.action.clone()))
            .or_default();
        if e.kind.is_skip() {
            counts.1 += 1;
        } else {
            counts.0 += 1;
        }
    }

    grouped
        .into_iter()
        .rev()
        .map(|(date, by_action)| {
            let summaries: Vec<ActionSummary> = by_action
                .into_iter()
                .map(|((profile, action), (executions, skipped))| ActionSummary {
                    profile,
                    action,
                    executions,
                    skipped,
                })
                .collect();
            DaySummary {
                date,
                executions: summaries.iter().map(|s| s.executions).sum(),
                skipped: summaries.iter().map(|s| s.skipped).sum(),
                summaries,
            }
        })
        .collect()
}

// ============================================================================
// Time spent
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimeSpent {
    /// Active seconds per profile.
    pub profiles: BTreeMap<String, i64>,
    /// Active seconds over every profile without double counting overlaps.
    pub total_seconds: i64,
}

fn active_seconds(mut times: Vec<i64>) -> i64 {
    times.sort_unstable();
    times
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|gap| *gap <= ACTIVE_GAP_SECS)
        .sum()
}

/// Approximate active time: gaps of at most five minutes between consecutive
/// entries count as active.
pub fn time_spent(entries: &[Entry]) -> TimeSpent {
    let mut per_profile: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for e in entries.iter().filter(|e| e.is_attributed()) {
        per_profile
            .entry(e.profile.clone())
            .or_default()
            .push(e.timestamp.timestamp());
    }

    let all: Vec<i64> = per_profile.values().flatten().copied().collect();
    TimeSpent {
        total_seconds: active_seconds(all),
        profiles: per_profile
            .into_iter()
            .map(|(profile, times)| (profile, active_seconds(times)))
            .collect(),
    }
}

// ============================================================================
// Voice lines
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceLine {
    pub text: String,
    pub count: usize,
}

/// Frequency of spoken text over voice-carrying steps.
pub fn voice_lines(entries: &[Entry]) -> Vec<VoiceLine> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for d in entries.iter().flat_map(|e| &e.details) {
        let carries_voice = d
            .step_type
            .parse::<StepKind>()
            .map(|k| k.carries_voice_text())
            .unwrap_or(false);
        if let (true, Some(text)) = (carries_voice, &d.voice_text) {
            *counts.entry(text.clone()).or_default() += 1;
        }
    }
    sort_voice_lines(counts)
}

/// Count descending, then text ascending.
pub fn sort_voice_lines(counts: HashMap<String, usize>) -> Vec<VoiceLine> {
    let mut lines: Vec<VoiceLine> = counts
        .into_iter()
        .map(|(text, count)| VoiceLine { text, count })
        .collect();
    lines.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.text.cmp(&b.text)));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Step;
    use crate::template::TemplateVars;
    use chrono::{DateTime, TimeZone};

    fn at(day: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, day, h, m, 0).unwrap()
    }

    fn exec(ts: DateTime<Local>, profile: &str, action: &str, text: &str) -> Entry {
        let vars = TemplateVars {
            profile: profile.into(),
            ..Default::default()
        };
        Entry::execution(ts, action, &[Step::say(text)], false, &vars, None)
    }

    #[test]
    fn day_summary_counts_and_ordering() {
        let entries = vec![
            exec(at(15, 9, 0), "boss", "done", "a"),
            exec(at(16, 9, 0), "work", "done", "a"),
            exec(at(16, 9, 5), "boss", "ready", "b"),
            Entry::cooldown_skipped(at(16, 9, 6), "boss", "ready", 30),
            Entry::cooldown_recorded(at(16, 9, 5), "boss", "ready", 30),
        ];
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let days = summarize_by_day_at(&entries, 7, today);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, today);
        assert_eq!(days[0].executions, 2);
        assert_eq!(days[0].skipped, 1);
        let keys: Vec<String> = days[0]
            .summaries
            .iter()
            .map(|s| format!("{}/{}", s.profile, s.action))
            .collect();
        assert_eq!(keys, vec!["boss/ready", "work/done"]);

        let total: usize = days.iter().map(|d| d.executions + d.skipped).sum();
        assert_eq!(total, 4);
        assert_eq!(summarize_by_day_at(&entries, 1, today).len(), 1);
    }

    #[test]
    fn time_spent_merges_overlapping_profiles() {
        let entries = vec![
            exec(at(16, 9, 0), "a", "x", "t"),
            exec(at(16, 9, 2), "b", "x", "t"),
            exec(at(16, 9, 4), "a", "x", "t"),
            exec(at(16, 9, 30), "a", "x", "t"),
        ];
        let spent = time_spent(&entries);
        assert_eq!(spent.profiles["a"], 240);
        assert_eq!(spent.profiles["b"], 0);
        assert_eq!(spent.total_seconds, 240);
    }

    #[test]
    fn voice_lines_sorted_by_count_then_text() {
        let entries = vec![
            exec(at(16, 9, 0), "a", "x", "zeta"),
            exec(at(16, 9, 1), "a", "x", "alpha"),
            exec(at(16, 9, 2), "a", "x", "zeta"),
            exec(at(16, 9, 3), "a", "x", "beta"),
        ];
        let lines = voice_lines(&entries);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["zeta", "alpha", "beta"]);
        assert_eq!(lines[0].count, 2);
    }
}
