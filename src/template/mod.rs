//! Placeholder substitution for human-facing step fields.
//!
//! Expansion is a single textual pass over a closed table of placeholders.
//! Unknown `{...}` sequences are copied through untouched.

use chrono::{DateTime, Local};
use serde::Serialize;

/// Placeholders understood by [`expand`].
pub const PLACEHOLDERS: [&str; 8] = [
    "{profile}",
    "{Profile}",
    "{command}",
    "{duration}",
    "{Duration}",
    "{hostname}",
    "{time}",
    "{date}",
];

/// Per-invocation variables. Built fresh for each trigger.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TemplateVars {
    pub profile: String,
    /// Action being triggered. Not a placeholder; exported to plugins.
    pub action: String,
    pub command: String,
    /// Compact duration, e.g. `2m5s`.
    pub duration: String,
    /// Spoken duration, e.g. `2 minutes 5 seconds`.
    pub duration_say: String,
    pub hostname: String,
    pub time: String,
    pub date: String,
    pub output: String,
    pub claude_hook: String,
    pub claude_message: String,
    pub claude_json: String,
}

impl TemplateVars {
    pub fn new(profile: &str, hostname: &str, now: DateTime<Local>) -> Self {
        Self {
            profile: profile.to_string(),
            hostname: hostname.to_string(),
            time: now.format("%H:%M").to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            ..Default::default()
        }
    }

    /// Set both duration renderings from a number of seconds.
    pub fn with_duration_secs(mut self, seconds: u64) -> Self {
        self.duration = format_compact(seconds);
        self.duration_say = format_spoken(seconds);
        self
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.command = command.to_string();
        self
    }

    fn value_of(&self, placeholder: &str) -> Option<String> {
        Some(match placeholder {
            "{profile}" => self.profile.clone(),
            "{Profile}" => title_case(&self.profile),
            "{command}" => self.command.clone(),
            "{duration}" => self.duration.clone(),
            "{Duration}" => self.duration_say.clone(),
            "{hostname}" => self.hostname.clone(),
            "{time}" => self.time.clone(),
            "{date}" => self.date.clone(),
            _ => return None,
        })
    }
}

/// Substitute every known placeholder in `input`.
///
/// Single pass: substituted values are never re-scanned, so a command that
/// contains `{profile}` is inserted literally.
pub fn expand(input: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let replaced = tail
            .find('}')
            .map(|end| &tail[..=end])
            .and_then(|token| vars.value_of(token).map(|v| (token.len(), v)));

        match replaced {
            Some((len, value)) => {
                out.push_str(&value);
                rest = &tail[len..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// True if `input` contains any known placeholder.
pub fn has_dynamic(input: &str) -> bool {
    PLACEHOLDERS.iter().any(|p| input.contains(p))
}

/// Upper-case the first letter of each `-`, `_` or space separated word.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = matches!(c, '-' | '_' | ' ');
    }
    out
}

/// `1h2m3s`, `2m5s`, `45s`.
pub fn format_compact(seconds: u64) -> String {
    let (h, m, s) = split_hms(seconds);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m{s}s"),
        _ => format!("{h}h{m}m{s}s"),
    }
}

/// `1 hour 2 minutes`, `2 minutes 5 seconds`, `45 seconds`.
///
/// Seconds are dropped once the duration reaches an hour.
pub fn format_spoken(seconds: u64) -> String {
    let (h, m, s) = split_hms(seconds);
    let unit = |n: u64, name: &str| {
        if n == 1 {
            format!("1 {name}")
        } else {
            format!("{n} {name}s")
        }
    };

    let mut parts = Vec::new();
    if h > 0 {
        parts.push(unit(h, "hour"));
        if m > 0 {
            parts.push(unit(m, "minute"));
        }
    } else {
        if m > 0 {
            parts.push(unit(m, "minute"));
        }
        if s > 0 || m == 0 {
            parts.push(unit(s, "second"));
        }
    }
    parts.join(" ")
}

fn split_hms(seconds: u64) -> (u64, u64, u64) {
    (seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars {
        TemplateVars {
            profile: "my-boss".into(),
            command: "cargo build".into(),
            hostname: "devbox".into(),
            ..Default::default()
        }
        .with_duration_secs(125)
    }

    #[test]
    fn expands_known_placeholders() {
        assert_eq!(
            expand("{Profile}: {command} took {duration} ({Duration}) on {hostname}", &vars()),
            "My-Boss: cargo build took 2m5s (2 minutes 5 seconds) on devbox"
        );
    }

    #[test]
    fn leaves_unknown_placeholders() {
        assert_eq!(expand("{nope} {profile} {", &vars()), "{nope} my-boss {");
        assert_eq!(expand("}{", &vars()), "}{");
    }

    #[test]
    fn single_pass_does_not_rescan_values() {
        let mut v = vars();
        v.command = "echo {profile}".into();
        assert_eq!(expand("{command}", &v), "echo {profile}");
    }

    #[test]
    fn detects_dynamic_text() {
        assert!(has_dynamic("{Profile} done"));
        assert!(has_dynamic("at {time}"));
        assert!(!has_dynamic("Boss done"));
        assert!(!has_dynamic("{unknown}"));
    }

    #[test]
    fn duration_renderings() {
        assert_eq!(format_compact(45), "45s");
        assert_eq!(format_compact(3723), "1h2m3s");
        assert_eq!(format_spoken(45), "45 seconds");
        assert_eq!(format_spoken(60), "1 minute");
        assert_eq!(format_spoken(3723), "1 hour 2 minutes");
        assert_eq!(format_spoken(0), "0 seconds");
    }

    #[test]
    fn title_cases_words() {
        assert_eq!(title_case("boss"), "Boss");
        assert_eq!(title_case("side_project two"), "Side_Project Two");
        assert_eq!(title_case(""), "");
    }
}
