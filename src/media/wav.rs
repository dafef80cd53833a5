//! Minimal RIFF/WAVE reader and writer.
//!
//! Reads PCM (format 1) at 8, 16 or 24 bits, mono or stereo, and converts to
//! the output format with linear-interpolation resampling.

use super::Pcm;
use crate::config::OUTPUT_SAMPLE_RATE;
use crate::error::{NotifyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Format {
    audio_format: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

fn err(message: impl Into<String>) -> NotifyError {
    NotifyError::driver("wav", message)
}

fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn u32_at(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

/// Parse a WAV file into PCM at its native rate and channel count.
pub fn decode(bytes: &[u8]) -> Result<Pcm> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(err("not a RIFF/WAVE file"));
    }

    let mut format: Option<Format> = None;
    let mut data: Option<&[u8]> = None;
    let mut pos = 12;

    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32_at(bytes, pos + 4) as usize;
        let body_start = pos + 8;
        let body_end = body_start.saturating_add(size).min(bytes.len());
        let body = &bytes[body_start..body_end];

        match id {
            b"fmt " => {
                if body.len() < 16 {
                    return Err(err("fmt chunk too short"));
                }
                format = Some(Format {
                    audio_format: u16_at(body, 0),
                    channels: u16_at(body, 2),
                    sample_rate: u32_at(body, 4),
                    bits_per_sample: u16_at(body, 14),
                });
            }
            b"data" => data = Some(body),
            _ => {}
        }

        // Chunks are padded to an even length.
        pos = body_start + size + (size & 1);
    }

    let format = format.ok_or_else(|| err("missing fmt chunk"))?;
    let data = data.ok_or_else(|| err("missing data chunk"))?;

    if format.audio_format != 1 {
        return Err(err(format!(
            "unsupported WAV format {} (only PCM is supported)",
            format.audio_format
        )));
    }
    if !(1..=2).contains(&format.channels) {
        return Err(err(format!("unsupported channel count {}", format.channels)));
    }
    if format.sample_rate == 0 {
        return Err(err("sample rate is zero"));
    }

    let samples: Vec<i16> = match format.bits_per_sample {
        8 => data.iter().map(|b| ((*b as i16) - 128) << 8).collect(),
        16 => data
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect(),
        24 => data
            .chunks_exact(3)
            .map(|c| i16::from_le_bytes([c[1], c[2]]))
            .collect(),
        other => return Err(err(format!("unsupported bit depth {other}"))),
    };

    Ok(Pcm {
        sample_rate: format.sample_rate,
        channels: format.channels,
        samples,
    })
}

/// Convert any decoded PCM to 44.1 kHz stereo.
pub fn to_output(pcm: &Pcm) -> Pcm {
    let stereo: Vec<i16> = match pcm.channels {
        1 => pcm.samples.iter().flat_map(|s| [*s, *s]).collect(),
        _ => pcm.samples.clone(),
    };
    let src = Pcm {
        sample_rate: pcm.sample_rate,
        channels: 2,
        samples: stereo,
    };
    resample(&src, OUTPUT_SAMPLE_RATE)
}

/// Linear-interpolation resample of interleaved stereo PCM.
pub fn resample(pcm: &Pcm, target_rate: u32) -> Pcm {
    if pcm.sample_rate == target_rate || pcm.frames() == 0 {
        return Pcm {
            sample_rate: target_rate,
            ..pcm.clone()
        };
    }

    let channels = pcm.channels as usize;
    let src_frames = pcm.frames();
    let ratio = pcm.sample_rate as f64 / target_rate as f64;
    let out_frames = ((src_frames as f64) / ratio).floor() as usize;

    let mut samples = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = pos - idx as f64;
        let next = (idx + 1).min(src_frames - 1);
        for ch in 0..channels {
            let a = pcm.samples[idx * channels + ch] as f64;
            let b = pcm.samples[next * channels + ch] as f64;
            samples.push((a + (b - a) * frac).round() as i16);
        }
    }

    Pcm {
        sample_rate: target_rate,
        channels: pcm.channels,
        samples,
    }
}

/// Decode, convert to output format and apply volume.
pub fn load_for_output(bytes: &[u8], volume: u8) -> Result<Pcm> {
    let mut pcm = to_output(&decode(bytes)?);
    pcm.scale_volume(volume);
    Ok(pcm)
}

/// Encode PCM as a 16-bit WAV file.
pub fn encode(pcm: &Pcm) -> Vec<u8> {
    let data_len = (pcm.samples.len() * 2) as u32;
    let block_align = pcm.channels * 2;
    let byte_rate = pcm.sample_rate * block_align as u32;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&pcm.channels.to_le_bytes());
    out.extend_from_slice(&pcm.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in &pcm.samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, rate: u32, bits: u16, data: &[u8]) -> Vec<u8> {
        let block_align = channels * bits / 8;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data.len() as u32 + 10).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&(rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        // An odd-sized chunk the reader has to skip.
        out.extend_from_slice(b"LIST");
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn decodes_each_bit_depth() {
        let pcm8 = decode(&wav_bytes(1, 8000, 8, &[128, 255, 0])).unwrap();
        assert_eq!(pcm8.samples, vec![0, 127 << 8, -128 << 8]);

        let pcm16 = decode(&wav_bytes(2, 8000, 16, &[0x10, 0x00, 0xF0, 0xFF])).unwrap();
        assert_eq!(pcm16.samples, vec![16, -16]);
        assert_eq!(pcm16.channels, 2);

        let pcm24 = decode(&wav_bytes(1, 8000, 24, &[0xAA, 0x34, 0x12])).unwrap();
        assert_eq!(pcm24.samples, vec![0x1234]);
    }

    #[test]
    fn rejects_non_pcm_and_garbage() {
        let mut bytes = wav_bytes(1, 8000, 16, &[0, 0]);
        bytes[20] = 3; // IEEE float
        assert!(decode(&bytes).unwrap_err().to_string().contains("only PCM"));
        assert!(decode(b"not a wav").is_err());
        assert!(decode(&wav_bytes(1, 8000, 32, &[0, 0, 0, 0])).is_err());
    }

    #[test]
    fn mono_upsamples_to_stereo_output() {
        let pcm = Pcm {
            sample_rate: 22_050,
            channels: 1,
            samples: vec![0, 1000, 2000, 3000],
        };
        let out = to_output(&pcm);
        assert_eq!(out.sample_rate, 44_100);
        assert_eq!(out.channels, 2);
        assert_eq!(out.frames(), 8);
        // Interpolated midpoint between the first two source frames.
        assert_eq!(&out.samples[..4], &[0, 0, 500, 500]);
    }

    #[test]
    fn encode_then_decode_preserves_samples() {
        let pcm = Pcm {
            sample_rate: 44_100,
            channels: 2,
            samples: vec![1, -1, 300, -300, i16::MAX, i16::MIN],
        };
        assert_eq!(decode(&encode(&pcm)).unwrap(), pcm);
    }

    #[test]
    fn load_for_output_applies_volume() {
        let pcm = Pcm {
            sample_rate: 44_100,
            channels: 2,
            samples: vec![1000, 1000],
        };
        let loaded = load_for_output(&encode(&pcm), 50).unwrap();
        assert_eq!(loaded.samples, vec![500, 500]);
    }
}
