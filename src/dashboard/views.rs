//! JSON projections served by the dashboard.

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{Config, StepKind};
use crate::eventlog::{
    breakdown, summary::summarize_by_day_at, time_spent, Breakdown, DaySummary, Entry, RangeKind,
    TimeSpent, VoiceLine,
};
use crate::routing::merge_credentials;
use crate::voice::{text_hash, VoiceCache};

// ============================================================================
// Credentials
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub ok: bool,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileCredentials {
    pub profile: String,
    /// Keyed by channel name (`discord`, `slack`, `telegram`, `openai`).
    pub channels: BTreeMap<String, ChannelStatus>,
}

/// Credential presence per profile, limited to channels its actions use.
pub fn credential_status(config: &Config) -> Vec<ProfileCredentials> {
    config
        .profiles
        .iter()
        .map(|(name, profile)| {
            let merged = merge_credentials(&config.options.credentials, profile.credentials.as_ref());
            let kinds: BTreeSet<StepKind> = profile
                .actions
                .values()
                .flat_map(|a| &a.steps)
                .filter_map(|s| s.kind())
                .collect();

            let mut channels: BTreeMap<String, ChannelStatus> = BTreeMap::new();
            for kind in kinds {
                let groups = [
                    (kind.channel(), kind.required_credentials()),
                    ("openai", kind.speech_credentials(config.options.tts_provider)),
                ];
                for (channel, required) in groups {
                    if required.is_empty() {
                        continue;
                    }
                    let status = channels.entry(channel.to_string()).or_insert(ChannelStatus {
                        ok: true,
                        missing: Vec::new(),
                    });
                    for &field in required {
                        if !merged.has(field) && !status.missing.iter().any(|m| m == field) {
                            status.missing.push(field.to_string());
                            status.ok = false;
                        }
                    }
                }
            }
            ProfileCredentials {
                profile: name.clone(),
                channels,
            }
        })
        .collect()
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StatsView {
    pub storage: String,
    pub path: String,
    pub size_bytes: u64,
    pub entries: usize,
    pub oldest: Option<DateTime<Local>>,
    pub newest: Option<DateTime<Local>>,
    pub uptime_seconds: u64,
}

// ============================================================================
// Voice
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceLineView {
    pub text: String,
    pub count: usize,
    pub hash: String,
    pub cached: bool,
}

pub fn annotate_voice_lines(lines: Vec<VoiceLine>, cache: &VoiceCache) -> Vec<VoiceLineView> {
    lines
        .into_iter()
        .map(|line| VoiceLineView {
            cached: cache.lookup(&line.text).is_some(),
            hash: text_hash(&line.text),
            text: line.text,
            count: line.count,
        })
        .collect()
}

// ============================================================================
// Watch
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WatchView {
    pub date: NaiveDate,
    pub range: RangeKind,
    pub summary: Vec<DaySummary>,
    pub breakdown: Breakdown,
    pub time_spent: TimeSpent,
}

/// Summary, breakdown and active time for the window of `range` around `date`.
pub fn watch_view(entries: &[Entry], date: NaiveDate, range: RangeKind) -> WatchView {
    let breakdown = breakdown(entries, date, range);
    let in_window: Vec<Entry> = entries
        .iter()
        .filter(|e| (breakdown.start..=breakdown.end).contains(&e.local_date()))
        .cloned()
        .collect();
    WatchView {
        date,
        range,
        summary: summarize_by_day_at(&in_window, 0, date),
        time_spent: time_spent(&in_window),
        breakdown,
    }
}

// ============================================================================
// Silent / trigger
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SilentView {
    pub silent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Local>>,
}

impl SilentView {
    pub fn from_until(until: Option<DateTime<Local>>) -> Self {
        Self {
            silent: until.is_some(),
            until,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Action, Credentials, Profile, Step};
    use crate::template::TemplateVars;
    use chrono::TimeZone;

    #[test]
    fn credential_status_reports_used_channels_only() {
        let mut config = Config::default();
        config.options.credentials.slack_webhook = "https://hooks.slack.test/x".into();
        let mut profile = Profile::default();
        profile.actions.insert(
            "done".into(),
            Action::new(vec![
                Step::sound("blip"),
                Step::with_text(StepKind::Slack, "hi"),
                Step::with_text(StepKind::Telegram, "hi"),
                Step::with_text(StepKind::TelegramVoice, "hi"),
            ]),
        );
        profile.credentials = Some(Credentials {
            telegram_token: "t".into(),
            ..Default::default()
        });
        config.profiles.insert("boss".into(), profile);

        let status = credential_status(&config);
        let channels = &status[0].channels;
        assert_eq!(channels.keys().collect::<Vec<_>>(), vec!["slack", "telegram"]);
        assert!(channels["slack"].ok);
        assert!(!channels["telegram"].ok);
        assert_eq!(channels["telegram"].missing, vec!["telegram_chat_id"]);
    }

    #[test]
    fn openai_speech_reports_openai_channel() {
        let mut config = Config::default();
        config.options.tts_provider = crate::config::TtsProvider::OpenAi;
        let mut profile = Profile::default();
        profile.actions.insert(
            "done".into(),
            Action::new(vec![Step::sound("blip"), Step::with_text(StepKind::Say, "hi")]),
        );
        config.profiles.insert("boss".into(), profile);

        let status = credential_status(&config);
        let channels = &status[0].channels;
        assert_eq!(channels.keys().collect::<Vec<_>>(), vec!["openai"]);
        assert_eq!(channels["openai"].missing, vec!["openai_api_key"]);

        config.options.tts_provider = crate::config::TtsProvider::System;
        assert!(credential_status(&config)[0].channels.is_empty());
    }

    #[test]
    fn watch_view_limits_summary_to_window() {
        let vars = TemplateVars {
            profile: "p".into(),
            ..Default::default()
        };
        let at = |m, d| Local.with_ymd_and_hms(2026, m, d, 10, 0, 0).unwrap();
        let entries = vec![
            Entry::execution(at(9, 30), "done", &[Step::sound("blip")], false, &vars, None),
            Entry::execution(at(10, 16), "done", &[Step::sound("blip")], false, &vars, None),
        ];
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let view = watch_view(&entries, date, RangeKind::Month);
        assert_eq!(view.summary.len(), 1);
        assert_eq!(view.breakdown.total, 1);
        assert_eq!(watch_view(&entries, date, RangeKind::Year).breakdown.total, 2);
    }
}
