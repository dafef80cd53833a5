use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::sync::Arc;

use super::convert::AudioConverter;
use super::driver::{check_response, ChannelDriver, Delivery};
use super::tts::VoiceRenderer;
use crate::error::{NotifyError, Result};

/// What a Telegram step sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramMode {
    /// `sendMessage`
    Text,
    /// `sendAudio` with a WAV attachment.
    Audio,
    /// `sendVoice` with an OGG/Opus attachment, shown as a voice bubble.
    Voice,
}

impl TelegramMode {
    fn channel(&self) -> &'static str {
        match self {
            TelegramMode::Text => "telegram",
            TelegramMode::Audio => "telegram_audio",
            TelegramMode::Voice => "telegram_voice",
        }
    }
}

/// Telegram Bot API driver for all three modes.
pub struct TelegramDriver {
    http: reqwest::Client,
    api_base: String,
    mode: TelegramMode,
    voice: Option<VoiceRenderer>,
    converter: Option<Arc<dyn AudioConverter>>,
}

impl TelegramDriver {
    pub fn text(http: reqwest::Client, api_base: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            mode: TelegramMode::Text,
            voice: None,
            converter: None,
        }
    }

    pub fn audio(http: reqwest::Client, api_base: &str, voice: VoiceRenderer) -> Self {
        Self {
            mode: TelegramMode::Audio,
            voice: Some(voice),
            ..Self::text(http, api_base)
        }
    }

    pub fn voice(
        http: reqwest::Client,
        api_base: &str,
        voice: VoiceRenderer,
        converter: Arc<dyn AudioConverter>,
    ) -> Self {
        Self {
            mode: TelegramMode::Voice,
            voice: Some(voice),
            converter: Some(converter),
            ..Self::text(http, api_base)
        }
    }

    fn endpoint(&self, token: &str, method: &str) -> String {
        format!("{}/bot{token}/{method}", self.api_base)
    }

    async fn render_wav(&self, delivery: &Delivery<'_>) -> Result<Vec<u8>> {
        match &self.voice {
            Some(voice) => voice.wav_for(delivery).await,
            None => Err(NotifyError::driver(
                self.mode.channel(),
                "no speech renderer configured",
            )),
        }
    }
}

#[async_trait]
impl ChannelDriver for TelegramDriver {
    async fn send(&self, delivery: &Delivery<'_>) -> Result<()> {
        let channel = self.mode.channel();
        let token = delivery.credential(channel, "telegram_token")?;
        let chat_id = delivery.credential(channel, "telegram_chat_id")?;
        let text = delivery.text();

        let request = match self.mode {
            TelegramMode::Text => self
                .http
                .post(self.endpoint(token, "sendMessage"))
                .json(&serde_json::json!({ "chat_id": chat_id, "text": text })),
            TelegramMode::Audio => {
                let wav = self.render_wav(delivery).await?;
                let form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .text("caption", text.to_string())
                    .text("title", text.to_string())
                    .part(
                        "audio",
                        Part::bytes(wav)
                            .file_name("notify.wav")
                            .mime_str("audio/wav")?,
                    );
                self.http
                    .post(self.endpoint(token, "sendAudio"))
                    .multipart(form)
            }
            TelegramMode::Voice => {
                let converter = self.converter.as_ref().ok_or_else(|| {
                    NotifyError::driver(channel, "WAV to OGG converter not available")
                })?;
                converter.ensure_available()?;
                let wav = self.render_wav(delivery).await?;
                let ogg = converter.wav_to_ogg(&wav).await?;
                let form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .text("caption", text.to_string())
                    .part(
                        "voice",
                        Part::bytes(ogg)
                            .file_name("voice.ogg")
                            .mime_str("audio/ogg")?,
                    );
                self.http
                    .post(self.endpoint(token, "sendVoice"))
                    .multipart(form)
            }
        };

        let resp = request.send().await?;
        check_response(channel, resp).await?;
        Ok(())
    }
}
