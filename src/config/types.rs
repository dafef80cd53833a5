use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::defaults::*;

// ============================================================================
// Global Options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Sqlite,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::File => "file",
            StorageKind::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for StorageKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(format!("invalid storage backend: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    #[default]
    System,
    #[serde(rename = "openai")]
    OpenAi,
}

/// Secrets used by the remote channels. Empty strings mean "not set".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub discord_webhook: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub slack_webhook: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub telegram_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub telegram_chat_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub openai_api_key: String,
}

impl Credentials {
    pub const FIELDS: [&'static str; 5] = [
        "discord_webhook",
        "slack_webhook",
        "telegram_token",
        "telegram_chat_id",
        "openai_api_key",
    ];

    pub fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "discord_webhook" => &self.discord_webhook,
            "slack_webhook" => &self.slack_webhook,
            "telegram_token" => &self.telegram_token,
            "telegram_chat_id" => &self.telegram_chat_id,
            "openai_api_key" => &self.openai_api_key,
            _ => return None,
        };
        Some(value.as_str())
    }

    pub fn fields_mut(&mut self) -> [&mut String; 5] {
        [
            &mut self.discord_webhook,
            &mut self.slack_webhook,
            &mut self.telegram_token,
            &mut self.telegram_chat_id,
            &mut self.openai_api_key,
        ]
    }

    /// True when `field` is present and non-empty.
    pub fn has(&self, field: &str) -> bool {
        self.get(field).map(|v| !v.is_empty()).unwrap_or(false)
    }
}

/// Global options, the `config` object of the config document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    #[serde(default = "default_volume")]
    pub default_volume: i64,
    #[serde(default = "default_afk_threshold")]
    pub afk_threshold_seconds: i64,
    #[serde(default = "default_true")]
    pub log: bool,
    #[serde(default)]
    pub cooldown: bool,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: i64,
    #[serde(default = "default_shell_hook_threshold")]
    pub shell_hook_threshold: i64,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub tts_provider: TtsProvider,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tts_voice: String,
    #[serde(default)]
    pub tts_rate: i64,
    #[serde(default)]
    pub credentials: Credentials,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            default_volume: DEFAULT_VOLUME as i64,
            afk_threshold_seconds: DEFAULT_AFK_THRESHOLD_SECS as i64,
            log: true,
            cooldown: false,
            cooldown_seconds: DEFAULT_COOLDOWN_SECS as i64,
            shell_hook_threshold: DEFAULT_SHELL_HOOK_THRESHOLD_SECS as i64,
            storage: StorageKind::default(),
            tts_provider: TtsProvider::default(),
            tts_voice: String::new(),
            tts_rate: 0,
            credentials: Credentials::default(),
        }
    }
}

impl Options {
    pub fn volume(&self) -> u8 {
        self.default_volume.clamp(0, 100) as u8
    }

    pub fn afk_threshold(&self) -> u64 {
        self.afk_threshold_seconds.max(0) as u64
    }

    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_seconds.max(0) as u64
    }

    pub fn shell_hook_threshold(&self) -> u64 {
        self.shell_hook_threshold.max(0) as u64
    }
}

fn default_volume() -> i64 {
    DEFAULT_VOLUME as i64
}

fn default_afk_threshold() -> i64 {
    DEFAULT_AFK_THRESHOLD_SECS as i64
}

fn default_cooldown_seconds() -> i64 {
    DEFAULT_COOLDOWN_SECS as i64
}

fn default_shell_hook_threshold() -> i64 {
    DEFAULT_SHELL_HOOK_THRESHOLD_SECS as i64
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Profiles and Actions
// ============================================================================

/// Auto-selection rule for `match_profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MatchRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_rule: Option<MatchRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop: Option<u32>,
    /// Every other key of the profile object is an action.
    #[serde(flatten)]
    pub actions: BTreeMap<String, Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(from = "ActionRepr")]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_seconds: Option<i64>,
    pub steps: Vec<Step>,
}

impl Action {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            cooldown_seconds: None,
            steps,
        }
    }
}

/// Accepted on-disk shapes for an action: a bare step list or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ActionRepr {
    Steps(Vec<Step>),
    Full {
        #[serde(default)]
        cooldown_seconds: Option<i64>,
        #[serde(default)]
        steps: Vec<Step>,
    },
}

impl From<ActionRepr> for Action {
    fn from(repr: ActionRepr) -> Self {
        match repr {
            ActionRepr::Steps(steps) => Action::new(steps),
            ActionRepr::Full {
                cooldown_seconds,
                steps,
            } => Action {
                cooldown_seconds,
                steps,
            },
        }
    }
}

// ============================================================================
// Steps
// ============================================================================

/// The known step types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepKind {
    Sound,
    Say,
    Toast,
    Discord,
    DiscordVoice,
    Slack,
    Telegram,
    TelegramAudio,
    TelegramVoice,
    Webhook,
    Mqtt,
    Plugin,
}

impl StepKind {
    pub const ALL: [StepKind; 12] = [
        StepKind::Sound,
        StepKind::Say,
        StepKind::Toast,
        StepKind::Discord,
        StepKind::DiscordVoice,
        StepKind::Slack,
        StepKind::Telegram,
        StepKind::TelegramAudio,
        StepKind::TelegramVoice,
        StepKind::Webhook,
        StepKind::Mqtt,
        StepKind::Plugin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Sound => "sound",
            StepKind::Say => "say",
            StepKind::Toast => "toast",
            StepKind::Discord => "discord",
            StepKind::DiscordVoice => "discord_voice",
            StepKind::Slack => "slack",
            StepKind::Telegram => "telegram",
            StepKind::TelegramAudio => "telegram_audio",
            StepKind::TelegramVoice => "telegram_voice",
            StepKind::Webhook => "webhook",
            StepKind::Mqtt => "mqtt",
            StepKind::Plugin => "plugin",
        }
    }

    /// Steps that own the audio device and therefore run one at a time.
    pub fn is_audio_lane(&self) -> bool {
        matches!(self, StepKind::Sound | StepKind::Say)
    }

    /// Step types whose text is spoken and recorded as voice text.
    pub fn carries_voice_text(&self) -> bool {
        matches!(
            self,
            StepKind::Say
                | StepKind::DiscordVoice
                | StepKind::TelegramAudio
                | StepKind::TelegramVoice
        )
    }

    /// Credential fields this step type needs after merging.
    pub fn required_credentials(&self) -> &'static [&'static str] {
        match self {
            StepKind::Discord | StepKind::DiscordVoice => &["discord_webhook"],
            StepKind::Slack => &["slack_webhook"],
            StepKind::Telegram | StepKind::TelegramAudio | StepKind::TelegramVoice => {
                &["telegram_token", "telegram_chat_id"]
            }
            _ => &[],
        }
    }

    /// Credential fields needed to render this step's speech with `provider`.
    pub fn speech_credentials(&self, provider: TtsProvider) -> &'static [&'static str] {
        if provider == TtsProvider::OpenAi && self.carries_voice_text() {
            &["openai_api_key"]
        } else {
            &[]
        }
    }

    /// Channel group used by the credential status view.
    pub fn channel(&self) -> &'static str {
        match self {
            StepKind::Discord | StepKind::DiscordVoice => "discord",
            StepKind::Telegram | StepKind::TelegramAudio | StepKind::TelegramVoice => "telegram",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown step type '{s}'"))
    }
}

/// Gating predicate of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    Always,
    Afk,
    Present,
    Run,
    Direct,
    Hours(u8, u8),
}

impl std::str::FromStr for When {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(When::Always),
            "afk" => Ok(When::Afk),
            "present" => Ok(When::Present),
            "run" => Ok(When::Run),
            "direct" => Ok(When::Direct),
            other => {
                let range = other
                    .strip_prefix("hours:")
                    .ok_or_else(|| format!("invalid when '{other}'"))?;
                let (start, end) = range
                    .split_once('-')
                    .ok_or_else(|| format!("invalid hours range '{range}' (want H1-H2)"))?;
                let parse_hour = |h: &str| -> Result<u8, String> {
                    h.trim()
                        .parse::<u8>()
                        .ok()
                        .filter(|h| *h <= 23)
                        .ok_or_else(|| format!("invalid hour '{h}' (want 0-23)"))
                };
                Ok(When::Hours(parse_hour(start)?, parse_hour(end)?))
            }
        }
    }
}

/// One delivery unit. The `type` tag selects the channel; the remaining fields
/// are optional and validated per type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Step {
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qos: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            step_type: kind.as_str().to_string(),
            ..Default::default()
        }
    }

    pub fn sound(name: &str) -> Self {
        Self {
            sound: Some(name.to_string()),
            ..Self::new(StepKind::Sound)
        }
    }

    pub fn say(text: &str) -> Self {
        Self::with_text(StepKind::Say, text)
    }

    pub fn toast(message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Self::new(StepKind::Toast)
        }
    }

    pub fn with_text(kind: StepKind, text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::new(kind)
        }
    }

    pub fn when(mut self, when: &str) -> Self {
        self.when = Some(when.to_string());
        self
    }

    pub fn kind(&self) -> Option<StepKind> {
        self.step_type.parse().ok()
    }

    /// Parsed `when`; a malformed predicate never matches.
    pub fn when_predicate(&self) -> Option<When> {
        self.when.as_deref().unwrap_or("").parse().ok()
    }

    /// Effective volume: the step override over the default, clamped to 0-100.
    pub fn effective_volume(&self, default: u8) -> u8 {
        self.volume
            .map(|v| v.clamp(0, 100) as u8)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_accepts_bare_list_and_object() {
        let bare: Action = serde_json::from_str(r#"[{"type":"sound","sound":"blip"}]"#).unwrap();
        assert_eq!(bare.steps.len(), 1);
        assert_eq!(bare.cooldown_seconds, None);

        let full: Action = serde_json::from_str(
            r#"{"cooldown_seconds": 10, "steps": [{"type":"say","text":"hi"}]}"#,
        )
        .unwrap();
        assert_eq!(full.cooldown_seconds, Some(10));
        assert_eq!(full.steps[0].kind(), Some(StepKind::Say));
    }

    #[test]
    fn profile_collects_actions_beside_reserved_keys() {
        let profile: Profile = serde_json::from_str(
            r#"{
                "aliases": ["b"],
                "extends": "default",
                "match": {"dir": "/work"},
                "desktop": 2,
                "done": [{"type": "say", "text": "done"}],
                "error": [{"type": "sound", "sound": "error"}]
            }"#,
        )
        .unwrap();
        assert_eq!(profile.aliases, vec!["b"]);
        assert_eq!(profile.extends.as_deref(), Some("default"));
        assert_eq!(profile.desktop, Some(2));
        assert_eq!(
            profile.actions.keys().cloned().collect::<Vec<_>>(),
            vec!["done", "error"]
        );
    }

    #[test]
    fn when_parses_every_form() {
        assert_eq!("".parse::<When>(), Ok(When::Always));
        assert_eq!("afk".parse::<When>(), Ok(When::Afk));
        assert_eq!("present".parse::<When>(), Ok(When::Present));
        assert_eq!("run".parse::<When>(), Ok(When::Run));
        assert_eq!("direct".parse::<When>(), Ok(When::Direct));
        assert_eq!("hours:22-6".parse::<When>(), Ok(When::Hours(22, 6)));
        assert!("hours:9-24".parse::<When>().is_err());
        assert!("hours:9".parse::<When>().is_err());
        assert!("sometimes".parse::<When>().is_err());
    }

    #[test]
    fn step_kind_round_trips_names() {
        for kind in StepKind::ALL {
            assert_eq!(kind.as_str().parse::<StepKind>(), Ok(kind));
        }
        assert!("beep".parse::<StepKind>().is_err());
        assert!(StepKind::Sound.is_audio_lane());
        assert!(StepKind::Say.is_audio_lane());
        assert!(!StepKind::TelegramVoice.is_audio_lane());
        assert!(StepKind::TelegramVoice.carries_voice_text());
        assert!(!StepKind::Telegram.carries_voice_text());
    }

    #[test]
    fn effective_volume_overlays_and_clamps() {
        let mut step = Step::sound("blip");
        assert_eq!(step.effective_volume(70), 70);
        step.volume = Some(30);
        assert_eq!(step.effective_volume(70), 30);
        step.volume = Some(400);
        assert_eq!(step.effective_volume(70), 100);
    }
}
