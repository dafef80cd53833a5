//! Parser for the text log format.
//!
//! Content is split into blank-line separated blocks. Within a block, every
//! line that starts with an RFC 3339 timestamp followed by two spaces is a
//! summary line and starts a new entry; `step[` lines attach to the entry
//! before them. A `cooldown=recorded` line may share a block with the
//! execution after it.

use chrono::{DateTime, Local};

use super::format::FIELD_SEP;
use super::{Entry, EntryKind, StepDetail};
use crate::config::StepKind;

/// Parse every entry in `content`, in order. Unparseable lines are skipped.
pub fn parse_content(content: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    for block in blocks(content) {
        let mut current: Option<Entry> = None;
        for line in block {
            if line.contains("step[") {
                if let (Some(entry), Some(detail)) = (current.as_mut(), parse_detail(line)) {
                    entry.details.push(detail);
                }
                continue;
            }
            if let Some(entry) = parse_summary(line) {
                entries.extend(current.replace(entry));
            }
        }
        entries.extend(current);
    }
    entries
}

fn blocks(content: &str) -> Vec<Vec<&str>> {
    let mut out = Vec::new();
    let mut block = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            if !block.is_empty() {
                out.push(std::mem::take(&mut block));
            }
        } else {
            block.push(line);
        }
    }
    if !block.is_empty() {
        out.push(block);
    }
    out
}

fn split_timestamp(line: &str) -> Option<(DateTime<Local>, &str)> {
    let (ts, rest) = line.split_once(FIELD_SEP)?;
    let ts = DateTime::parse_from_rfc3339(ts).ok()?;
    Some((ts.with_timezone(&Local), rest))
}

/// Value inside the first pair of parentheses.
fn paren(value: &str) -> String {
    value
        .split_once('(')
        .and_then(|(_, rest)| rest.split_once(')'))
        .map(|(inner, _)| inner.to_string())
        .unwrap_or_default()
}

fn unquote(s: &str) -> Option<&str> {
    s.strip_prefix('"')?.strip_suffix('"')
}

/// Parse a summary line into an entry without details.
pub fn parse_summary(line: &str) -> Option<Entry> {
    let (timestamp, rest) = split_timestamp(line)?;

    // The quoted message is always last and may itself contain separators.
    let (head, claude_message) = match rest.find("claude_message=\"") {
        Some(pos) => {
            let value = &rest[pos + "claude_message=".len()..];
            (rest[..pos].trim_end(), unquote(value.trim_end()).unwrap_or(value))
        }
        None => (rest, ""),
    };

    let mut entry = Entry {
        timestamp,
        profile: String::new(),
        action: String::new(),
        kind: EntryKind::Other,
        afk: false,
        desktop: None,
        claude_hook: String::new(),
        claude_message: claude_message.to_string(),
        steps: Vec::new(),
        details: Vec::new(),
        extra: String::new(),
    };

    let mut has_steps = false;
    let mut cooldown = None;
    let mut silent = None;
    for field in head.split(FIELD_SEP).map(str::trim).filter(|f| !f.is_empty()) {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        match key {
            "profile" => entry.profile = value.to_string(),
            "action" => entry.action = value.to_string(),
            "steps" => {
                has_steps = true;
                entry.steps = value
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "afk" => entry.afk = value == "true",
            "desktop" => entry.desktop = value.parse().ok(),
            "claude_hook" => entry.claude_hook = value.to_string(),
            "cooldown" => cooldown = Some(value),
            "silent" => silent = Some(value),
            _ => {}
        }
    }

    entry.kind = if has_steps {
        EntryKind::Execution
    } else {
        match (cooldown, silent) {
            (Some(v), _) if v.starts_with("skipped") => EntryKind::CooldownSkipped,
            (_, Some("skipped")) => EntryKind::SilentSkipped,
            (Some(v), _) if v.starts_with("recorded") => EntryKind::CooldownRecorded,
            (_, Some(v)) if v.starts_with("enabled") => EntryKind::SilentEnabled,
            (_, Some("disabled")) => EntryKind::SilentDisabled,
            _ => EntryKind::Other,
        }
    };
    entry.extra = match entry.kind {
        EntryKind::CooldownSkipped | EntryKind::CooldownRecorded => paren(cooldown.unwrap_or("")),
        EntryKind::SilentEnabled => paren(silent.unwrap_or("")),
        EntryKind::Other => rest.to_string(),
        _ => String::new(),
    };
    Some(entry)
}

/// Parse `<ts>    step[<i>] <type>  <detail>`.
pub fn parse_detail(line: &str) -> Option<StepDetail> {
    let after = &line[line.find("step[")? + "step[".len()..];
    let (index, rest) = after.split_once(']')?;
    let index = index.trim().parse().ok()?;
    let rest = rest.trim_start();
    let (step_type, detail) = rest.split_once(FIELD_SEP).unwrap_or((rest, ""));

    let voice_text = step_type
        .parse::<StepKind>()
        .ok()
        .filter(StepKind::carries_voice_text)
        .and_then(|_| unquote(detail))
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Some(StepDetail {
        index,
        step_type: step_type.to_string(),
        detail: detail.to_string(),
        voice_text,
    })
}
