use async_trait::async_trait;
use std::sync::Arc;

use super::driver::{ChannelDriver, Delivery};
use crate::error::{NotifyError, Result};
use crate::infra::fs::expand_home;
use crate::media::{tones, wav, AudioContext, Pcm};

/// Plays a built-in tone or a WAV file.
pub struct SoundDriver {
    audio: Arc<AudioContext>,
}

impl SoundDriver {
    pub fn new(audio: Arc<AudioContext>) -> Self {
        Self { audio }
    }
}

/// Render `name` (a tone or a WAV path) at `volume`.
pub fn render_sound(name: &str, volume: u8) -> Result<Pcm> {
    if let Some(segments) = tones::lookup(name) {
        return Ok(tones::render(segments, volume));
    }

    let path = expand_home(name);
    let bytes = std::fs::read(&path).map_err(|e| {
        NotifyError::driver(
            "sound",
            format!("unknown sound '{name}' (not a built-in tone or readable WAV file: {e})"),
        )
    })?;
    wav::load_for_output(&bytes, volume)
}

#[async_trait]
impl ChannelDriver for SoundDriver {
    async fn send(&self, delivery: &Delivery<'_>) -> Result<()> {
        let name = delivery
            .step
            .sound
            .as_deref()
            .ok_or_else(|| NotifyError::driver("sound", "step has no 'sound'"))?;
        let pcm = render_sound(name, delivery.volume)?;
        self.audio.play(pcm).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Pcm;
    use tempfile::TempDir;

    #[test]
    fn renders_tone_by_name() {
        let pcm = render_sound("ding", 100).unwrap();
        assert!(pcm.frames() > 0);
    }

    #[test]
    fn renders_wav_file_with_volume() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ok.wav");
        let source = Pcm {
            sample_rate: 44_100,
            channels: 2,
            samples: vec![2000, 2000],
        };
        std::fs::write(&path, wav::encode(&source)).unwrap();

        let pcm = render_sound(path.to_str().unwrap(), 25).unwrap();
        assert_eq!(pcm.samples, vec![500, 500]);
    }

    #[test]
    fn unknown_tone_without_file_fails() {
        let err = render_sound("kazoo", 100).unwrap_err();
        assert!(err.to_string().contains("unknown sound 'kazoo'"));
    }
}
