//! Audio rendering: synthesized tones, WAV decoding/encoding and playback.
//!
//! Everything that reaches the output device is 44.1 kHz stereo 16-bit PCM.

pub mod playback;
pub mod tones;
pub mod wav;

pub use playback::{AudioContext, AudioOutput};

use crate::config::OUTPUT_SAMPLE_RATE;

/// Interleaved signed 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcm {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl Pcm {
    /// Empty buffer in the output format.
    pub fn output() -> Self {
        Self {
            sample_rate: OUTPUT_SAMPLE_RATE,
            channels: 2,
            samples: Vec::new(),
        }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    /// Multiply every sample by `volume / 100`.
    pub fn scale_volume(&mut self, volume: u8) {
        if volume >= 100 {
            return;
        }
        let factor = volume as f32 / 100.0;
        for s in &mut self.samples {
            *s = (*s as f32 * factor).round() as i16;
        }
    }
}
