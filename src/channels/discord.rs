use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::driver::{check_response, ChannelDriver, Delivery};
use super::tts::VoiceRenderer;
use crate::error::Result;

/// Text message through a Discord webhook.
pub struct DiscordDriver {
    http: reqwest::Client,
}

impl DiscordDriver {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChannelDriver for DiscordDriver {
    async fn send(&self, delivery: &Delivery<'_>) -> Result<()> {
        let url = delivery.credential("discord", "discord_webhook")?;
        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({ "content": delivery.text() }))
            .send()
            .await?;
        check_response("discord", resp).await?;
        Ok(())
    }
}

/// Spoken text rendered to WAV and attached to a Discord webhook post.
pub struct DiscordVoiceDriver {
    http: reqwest::Client,
    voice: VoiceRenderer,
}

impl DiscordVoiceDriver {
    pub fn new(http: reqwest::Client, voice: VoiceRenderer) -> Self {
        Self { http, voice }
    }
}

#[async_trait]
impl ChannelDriver for DiscordVoiceDriver {
    async fn send(&self, delivery: &Delivery<'_>) -> Result<()> {
        let url = delivery.credential("discord_voice", "discord_webhook")?;
        let wav = self.voice.wav_for(delivery).await?;

        let payload = serde_json::json!({ "content": delivery.text() });
        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part(
                "files[0]",
                Part::bytes(wav)
                    .file_name("voice.wav")
                    .mime_str("audio/wav")?,
            );

        let resp = self.http.post(url).multipart(form).send().await?;
        check_response("discord_voice", resp).await?;
        Ok(())
    }
}
