//! Delivery channels.
//!
//! Each step type maps to one [`ChannelDriver`]. [`DriverSet::builtin`] wires
//! every driver to its shared dependencies; tests swap individual drivers out
//! with [`DriverSet::with_driver`].

mod convert;
mod discord;
mod driver;
mod mqtt;
mod plugin;
mod say;
mod slack;
mod sound;
mod telegram;
mod toast;
mod tts;
mod webhook;

pub use convert::{find_executable, AudioConverter, FfmpegConverter};
pub use discord::{DiscordDriver, DiscordVoiceDriver};
pub use driver::{check_response, http_client, ChannelDriver, Delivery, DriverSet, ExternalCommand};
pub use mqtt::{parse_broker, MqttDriver};
pub use plugin::{effective_timeout, plugin_env, PluginDriver};
pub use say::SayDriver;
pub use slack::SlackDriver;
pub use sound::{render_sound, SoundDriver};
pub use telegram::{TelegramDriver, TelegramMode};
pub use toast::{default_title, toast_command, ToastDriver};
pub use tts::{speech_engine, OpenAiSpeech, SpeechEngine, SpeechRequest, SystemSpeech, VoiceRenderer};
pub use webhook::{default_body, WebhookDriver};

use std::sync::Arc;

use crate::config::{Config, StepKind, TELEGRAM_API_BASE};
use crate::error::Result;
use crate::infra::paths::DataPaths;
use crate::media::AudioContext;
use crate::voice::VoiceCache;

// ============================================================================
// Dependencies
// ============================================================================

/// Shared collaborators handed to the built-in drivers.
#[derive(Clone)]
pub struct DriverDeps {
    pub http: reqwest::Client,
    pub audio: Arc<AudioContext>,
    pub speech: Arc<dyn SpeechEngine>,
    pub converter: Arc<dyn AudioConverter>,
    pub voice_cache: Arc<VoiceCache>,
    pub telegram_api_base: String,
}

impl DriverDeps {
    /// Production dependencies: shared HTTP client, process-wide audio
    /// context, the configured speech engine and `ffmpeg` from `PATH`.
    pub fn new(config: &Config, paths: &DataPaths) -> Result<Self> {
        let http = http_client()?;
        let audio = AudioContext::shared();
        let speech = speech_engine(&config.options, http.clone(), audio.clone());
        Ok(Self {
            http,
            audio,
            speech,
            converter: Arc::new(FfmpegConverter::new()),
            voice_cache: Arc::new(VoiceCache::open(paths.root())),
            telegram_api_base: TELEGRAM_API_BASE.to_string(),
        })
    }

    pub fn with_telegram_api_base(mut self, base: &str) -> Self {
        self.telegram_api_base = base.to_string();
        self
    }

    fn voice(&self) -> VoiceRenderer {
        VoiceRenderer::new(self.speech.clone(), self.voice_cache.clone())
    }
}

// ============================================================================
// Registry
// ============================================================================

impl DriverSet {
    /// One driver per step type.
    pub fn builtin(deps: DriverDeps) -> Self {
        let base = deps.telegram_api_base.as_str();
        Self::empty()
            .with_driver(StepKind::Sound, Arc::new(SoundDriver::new(deps.audio.clone())))
            .with_driver(
                StepKind::Say,
                Arc::new(SayDriver::new(deps.audio.clone(), deps.voice())),
            )
            .with_driver(StepKind::Toast, Arc::new(ToastDriver))
            .with_driver(StepKind::Discord, Arc::new(DiscordDriver::new(deps.http.clone())))
            .with_driver(
                StepKind::DiscordVoice,
                Arc::new(DiscordVoiceDriver::new(deps.http.clone(), deps.voice())),
            )
            .with_driver(StepKind::Slack, Arc::new(SlackDriver::new(deps.http.clone())))
            .with_driver(
                StepKind::Telegram,
                Arc::new(TelegramDriver::text(deps.http.clone(), base)),
            )
            .with_driver(
                StepKind::TelegramAudio,
                Arc::new(TelegramDriver::audio(deps.http.clone(), base, deps.voice())),
            )
            .with_driver(
                StepKind::TelegramVoice,
                Arc::new(TelegramDriver::voice(
                    deps.http.clone(),
                    base,
                    deps.voice(),
                    deps.converter.clone(),
                )),
            )
            .with_driver(StepKind::Webhook, Arc::new(WebhookDriver::new(deps.http.clone())))
            .with_driver(StepKind::Mqtt, Arc::new(MqttDriver::new()))
            .with_driver(StepKind::Plugin, Arc::new(PluginDriver))
    }
}
