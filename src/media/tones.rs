//! Built-in synthesized tones.

use std::f32::consts::PI;

use super::Pcm;
use crate::config::OUTPUT_SAMPLE_RATE;

/// Attack/release ramp applied to every segment to avoid clicks.
pub const ENVELOPE_MS: u32 = 5;

/// One piece of a tone. A frequency of 0 is silence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub freq: f32,
    pub duration_ms: u32,
    pub volume: f32,
}

const fn seg(freq: f32, duration_ms: u32, volume: f32) -> Segment {
    Segment {
        freq,
        duration_ms,
        volume,
    }
}

const fn rest(duration_ms: u32) -> Segment {
    seg(0.0, duration_ms, 0.0)
}

static TONES: &[(&str, &[Segment])] = &[
    ("blip", &[seg(880.0, 80, 0.6)]),
    ("click", &[seg(2000.0, 15, 0.5)]),
    ("pop", &[seg(600.0, 40, 0.6), seg(900.0, 30, 0.4)]),
    ("ding", &[seg(1318.5, 300, 0.5)]),
    (
        "chime",
        &[seg(1046.5, 150, 0.5), seg(1318.5, 150, 0.5), seg(1568.0, 300, 0.5)],
    ),
    (
        "bell",
        &[seg(987.8, 120, 0.6), seg(987.8, 400, 0.3)],
    ),
    (
        "success",
        &[seg(523.3, 100, 0.5), seg(659.3, 100, 0.5), seg(784.0, 200, 0.5)],
    ),
    (
        "error",
        &[seg(440.0, 150, 0.6), rest(50), seg(330.0, 300, 0.6)],
    ),
    (
        "warning",
        &[seg(660.0, 150, 0.6), rest(80), seg(660.0, 150, 0.6)],
    ),
    (
        "alert",
        &[
            seg(880.0, 100, 0.6),
            rest(50),
            seg(880.0, 100, 0.6),
            rest(50),
            seg(880.0, 100, 0.6),
        ],
    ),
    ("ready", &[seg(659.3, 100, 0.5), seg(880.0, 150, 0.5)]),
    (
        "done",
        &[seg(784.0, 100, 0.5), seg(659.3, 100, 0.5), seg(523.3, 200, 0.5)],
    ),
];

pub fn lookup(name: &str) -> Option<&'static [Segment]> {
    TONES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, segments)| *segments)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    TONES.iter().map(|(n, _)| *n)
}

/// Render segments to output-format PCM at `volume` (0-100).
pub fn render(segments: &[Segment], volume: u8) -> Pcm {
    let rate = OUTPUT_SAMPLE_RATE as f32;
    let master = volume.min(100) as f32 / 100.0;
    let ramp = (OUTPUT_SAMPLE_RATE * ENVELOPE_MS / 1000) as usize;

    let mut pcm = Pcm::output();
    for segment in segments {
        let frames = (OUTPUT_SAMPLE_RATE as u64 * segment.duration_ms as u64 / 1000) as usize;
        let ramp = ramp.min(frames / 2);
        for i in 0..frames {
            let value = if segment.freq <= 0.0 {
                0.0
            } else {
                let envelope = if ramp == 0 {
                    1.0
                } else if i < ramp {
                    i as f32 / ramp as f32
                } else if i >= frames - ramp {
                    (frames - 1 - i) as f32 / ramp as f32
                } else {
                    1.0
                };
                (2.0 * PI * segment.freq * i as f32 / rate).sin()
                    * segment.volume
                    * envelope
                    * master
            };
            let sample = (value * i16::MAX as f32) as i16;
            pcm.samples.push(sample);
            pcm.samples.push(sample);
        }
    }
    pcm
}
