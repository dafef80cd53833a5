//! Execution counts bucketed over a date range.
//!
//! `day` buckets by hour (trimmed to the occupied hours), `week` and `month`
//! by day, `year` and `total` by month.

use chrono::{Datelike, Duration, NaiveDate, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{Entry, EntryKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RangeKind {
    #[default]
    Day,
    Week,
    Month,
    Year,
    Total,
}

impl RangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeKind::Day => "day",
            RangeKind::Week => "week",
            RangeKind::Month => "month",
            RangeKind::Year => "year",
            RangeKind::Total => "total",
        }
    }
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "day" => Ok(RangeKind::Day),
            "week" => Ok(RangeKind::Week),
            "month" => Ok(RangeKind::Month),
            "year" => Ok(RangeKind::Year),
            "total" | "all" => Ok(RangeKind::Total),
            other => Err(format!("unknown range '{other}' (want day, week, month, year or total)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownBucket {
    pub label: String,
    /// Executions per profile.
    pub profiles: BTreeMap<String, usize>,
    pub total: usize,
    /// Share of the grand total, 0-100.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub range: RangeKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total: usize,
    pub buckets: Vec<BreakdownBucket>,
}

/// Bucket identity: (year, month, day, hour) with unused parts zeroed.
type Key = (i32, u32, u32, u32);

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn last_of_month(year: i32, month: u32) -> NaiveDate {
    let (y, m) = next_month(year, month);
    first_of_month(y, m) - Duration::days(1)
}

fn day_keys(start: NaiveDate, end: NaiveDate) -> Vec<(Key, String)> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|d| ((d.year(), d.month(), d.day(), 0), d.format("%a %m-%d").to_string()))
        .collect()
}

fn month_keys(from: (i32, u32), to: (i32, u32)) -> Vec<(Key, String)> {
    let mut keys = Vec::new();
    let mut cur = from;
    while cur <= to {
        let label = first_of_month(cur.0, cur.1).format("%Y-%m").to_string();
        keys.push(((cur.0, cur.1, 0, 0), label));
        cur = next_month(cur.0, cur.1);
    }
    keys
}

/// Break down executions for the window of `range` containing `date`.
pub fn breakdown(entries: &[Entry], date: NaiveDate, range: RangeKind) -> Breakdown {
    let executions: Vec<&Entry> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Execution)
        .collect();

    let (start, end) = match range {
        RangeKind::Day => (date, date),
        RangeKind::Week => {
            let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
            (monday, monday + Duration::days(6))
        }
        RangeKind::Month => (
            first_of_month(date.year(), date.month()),
            last_of_month(date.year(), date.month()),
        ),
        RangeKind::Year => (
            first_of_month(date.year(), 1),
            last_of_month(date.year(), 12),
        ),
        RangeKind::Total => {
            let first = executions.iter().map(|e| e.local_date()).min().unwrap_or(date);
            let last = executions.iter().map(|e| e.local_date()).max().unwrap_or(date);
            (
                first_of_month(first.year(), first.month()),
                last_of_month(last.year(), last.month()),
            )
        }
    };

    let key_of = |e: &Entry| -> Key {
        let d = e.local_date();
        match range {
            RangeKind::Day => (d.year(), d.month(), d.day(), e.timestamp.hour()),
            RangeKind::Week | RangeKind::Month => (d.year(), d.month(), d.day(), 0),
            RangeKind::Year | RangeKind::Total => (d.year(), d.month(), 0, 0),
        }
    };

    let mut counts: BTreeMap<Key, BTreeMap<String, usize>> = BTreeMap::new();
    for e in executions.iter().filter(|e| (start..=end).contains(&e.local_date())) {
        *counts
            .entry(key_of(e))
            .or_default()
            .entry(e.profile.clone())
            .or_default() += 1;
    }

    let keys: Vec<(Key, String)> = match range {
        RangeKind::Day => {
            let hours: Vec<u32> = counts.keys().map(|k| k.3).collect();
            match (hours.iter().min(), hours.iter().max()) {
                (Some(&first), Some(&last)) => (first..=last)
                    .map(|h| ((date.year(), date.month(), date.day(), h), format!("{h:02}:00")))
                    .collect(),
                _ => Vec::new(),
            }
        }
        RangeKind::Week | RangeKind::Month => day_keys(start, end),
        RangeKind::Year | RangeKind::Total => month_keys(
            (start.year(), start.month()),
            (end.year(), end.month()),
        ),
    };

    let total: usize = counts.values().flat_map(|p| p.values()).sum();
    let buckets = keys
        .into_iter()
        .map(|(key, label)| {
            let profiles = counts.remove(&key).unwrap_or_default();
            let bucket_total: usize = profiles.values().sum();
            let percent = if total == 0 {
                0.0
            } else {
                bucket_total as f64 * 100.0 / total as f64
            };
            BreakdownBucket {
                label,
                profiles,
                total: bucket_total,
                percent,
            }
        })
        .collect();

    Breakdown {
        range,
        start,
        end,
        total,
        buckets,
    }
}
