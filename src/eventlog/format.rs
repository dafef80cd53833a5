//! Text rendering of log entries.
//!
//! ```text
//! <ts>  profile=<p>  action=<a>  steps=<t1,t2>  afk=<bool>  [desktop=<n>]  [claude_hook=<h>]  [claude_message="<m>"]
//! <ts>    step[<i>] <type>  <detail>
//! ```
//!
//! Blocks end with a blank line, except a `cooldown=recorded` line, which
//! shares the block of the execution that follows it.

use chrono::{DateTime, Local, SecondsFormat};

use super::{Entry, EntryKind};
use crate::config::{Step, StepKind};

/// Separator between fields on a summary line.
pub const FIELD_SEP: &str = "  ";

/// RFC 3339 with whole seconds and a numeric offset.
pub fn timestamp(ts: &DateTime<Local>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Collapse line breaks so a value cannot split a log line.
pub fn single_line(s: &str) -> String {
    if !s.contains(['\n', '\r']) {
        return s.to_string();
    }
    s.split(['\n', '\r'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", single_line(s))
}

/// Detail string for one (expanded) step.
pub fn step_detail(step: &Step) -> String {
    let text = step.text.as_deref().unwrap_or("");
    let Some(kind) = step.kind() else {
        return String::new();
    };
    match kind {
        StepKind::Sound => single_line(step.sound.as_deref().unwrap_or("")),
        StepKind::Toast => {
            let message = step.message.as_deref().unwrap_or("");
            match step.title.as_deref().filter(|t| !t.is_empty()) {
                Some(title) => quoted(&format!("{title}: {message}")),
                None => quoted(message),
            }
        }
        StepKind::Webhook => single_line(step.url.as_deref().unwrap_or("")),
        StepKind::Mqtt => format!(
            "{} {}",
            step.broker.as_deref().unwrap_or(""),
            step.topic.as_deref().unwrap_or("")
        ),
        StepKind::Plugin => single_line(step.command.as_deref().unwrap_or("")),
        _ => quoted(text),
    }
}

/// Spoken text for voice-carrying step types.
pub fn voice_text(step: &Step) -> Option<String> {
    let kind = step.kind()?;
    if !kind.carries_voice_text() {
        return None;
    }
    step.text
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(single_line)
}

/// Summary line of an entry, without the trailing newline.
pub fn summary_line(entry: &Entry) -> String {
    let ts = timestamp(&entry.timestamp);
    if entry.kind == EntryKind::Other {
        return format!("{ts}{FIELD_SEP}{}", entry.extra);
    }

    let mut fields = vec![ts];
    if !entry.profile.is_empty() {
        fields.push(format!("profile={}", entry.profile));
    }
    if !entry.action.is_empty() {
        fields.push(format!("action={}", entry.action));
    }
    match entry.kind {
        EntryKind::Execution => {
            fields.push(format!("steps={}", entry.steps.join(",")));
            fields.push(format!("afk={}", entry.afk));
            if let Some(desktop) = entry.desktop {
                fields.push(format!("desktop={desktop}"));
            }
            if !entry.claude_hook.is_empty() {
                fields.push(format!("claude_hook={}", entry.claude_hook));
            }
            if !entry.claude_message.is_empty() {
                fields.push(format!("claude_message={}", quoted(&entry.claude_message)));
            }
        }
        EntryKind::CooldownSkipped => fields.push(format!("cooldown=skipped ({})", entry.extra)),
        EntryKind::CooldownRecorded => fields.push(format!("cooldown=recorded ({})", entry.extra)),
        EntryKind::SilentSkipped => fields.push("silent=skipped".to_string()),
        EntryKind::SilentEnabled => fields.push(format!("silent=enabled ({})", entry.extra)),
        EntryKind::SilentDisabled => fields.push("silent=disabled".to_string()),
        EntryKind::Other => {}
    }
    fields.join(FIELD_SEP)
}

/// Lines for one entry plus the block terminator.
pub fn block(entry: &Entry) -> String {
    let ts = timestamp(&entry.timestamp);
    let mut out = summary_line(entry);
    out.push('\n');
    for d in &entry.details {
        out.push_str(&ts);
        out.push_str("    ");
        out.push_str(&format!("step[{}] {}", d.index, d.step_type));
        if !d.detail.is_empty() {
            out.push_str(FIELD_SEP);
            out.push_str(&d.detail);
        }
        out.push('\n');
    }
    if entry.kind != EntryKind::CooldownRecorded {
        out.push('\n');
    }
    out
}

/// Full text rendering of `entries`.
pub fn render(entries: &[Entry]) -> String {
    entries.iter().map(block).collect()
}
