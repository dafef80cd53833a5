use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::driver::{ChannelDriver, Delivery};
use super::tts::{SpeechRequest, VoiceRenderer};
use crate::error::Result;
use crate::media::{wav, AudioContext};

/// Speaks the step text. A voice-cache hit on literal text plays the cached
/// WAV instead of invoking the speech engine.
pub struct SayDriver {
    audio: Arc<AudioContext>,
    voice: VoiceRenderer,
}

impl SayDriver {
    pub fn new(audio: Arc<AudioContext>, voice: VoiceRenderer) -> Self {
        Self { audio, voice }
    }
}

#[async_trait]
impl ChannelDriver for SayDriver {
    async fn send(&self, delivery: &Delivery<'_>) -> Result<()> {
        if let Some(path) = self.voice.cached(delivery) {
            debug!(path = %path.display(), "playing cached voice");
            let bytes = tokio::fs::read(&path).await?;
            let pcm = wav::load_for_output(&bytes, delivery.volume)?;
            return self.audio.play(pcm).await;
        }

        self.voice
            .speech
            .speak(&SpeechRequest::from_delivery(delivery))
            .await
    }
}
