//! Process-wide audio context.
//!
//! Every playback goes through one [`AudioContext`], which holds a single
//! async gate so two tones never overlap on the device. Playback itself is
//! blocking and runs on the blocking thread pool.

use once_cell::sync::OnceCell;
use std::process::Command;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{wav, Pcm};
use crate::error::{NotifyError, Result};

/// Blocking sink for output-format PCM.
pub trait AudioOutput: Send + Sync {
    /// Play `pcm` and return once it has finished.
    fn play(&self, pcm: &Pcm) -> Result<()>;
}

pub struct AudioContext {
    output: Arc<dyn AudioOutput>,
    gate: Mutex<()>,
}

static SHARED: OnceCell<Arc<AudioContext>> = OnceCell::new();

impl AudioContext {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            gate: Mutex::new(()),
        }
    }

    /// The process-wide context backed by the platform output.
    pub fn shared() -> Arc<AudioContext> {
        SHARED
            .get_or_init(|| Arc::new(AudioContext::new(default_output())))
            .clone()
    }

    /// Play and wait for completion. Concurrent callers queue on the gate.
    pub async fn play(&self, pcm: Pcm) -> Result<()> {
        if pcm.samples.is_empty() {
            return Ok(());
        }
        let _guard = self.gate.lock().await;
        let output = self.output.clone();
        debug!(ms = pcm.duration_ms(), "playing audio");
        tokio::task::spawn_blocking(move || output.play(&pcm))
            .await
            .map_err(|e| NotifyError::driver("audio", format!("playback task failed: {e}")))?
    }
}

/// Output chosen at build time.
pub fn default_output() -> Arc<dyn AudioOutput> {
    #[cfg(feature = "native-audio")]
    {
        Arc::new(RodioOutput)
    }
    #[cfg(not(feature = "native-audio"))]
    {
        Arc::new(CommandOutput)
    }
}

// ============================================================================
// Command-line player
// ============================================================================

/// Writes a temporary WAV and hands it to the platform player
/// (`paplay`/`aplay`, `afplay`, PowerShell `Media.SoundPlayer`). The path is
/// passed in `NOTIFY_WAV` for PowerShell so it is never spliced into a script.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandOutput;

impl AudioOutput for CommandOutput {
    fn play(&self, pcm: &Pcm) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("notify-")
            .suffix(".wav")
            .tempfile()?;
        std::io::Write::write_all(&mut file, &wav::encode(pcm))?;
        let path = file.path().to_string_lossy().into_owned();

        let mut last_error = None;
        for (program, args) in player_commands(&path) {
            let result = Command::new(program)
                .args(&args)
                .env("NOTIFY_WAV", &path)
                .output();
            match result {
                Ok(out) if out.status.success() => return Ok(()),
                Ok(out) => {
                    last_error = Some(format!(
                        "{program} exited with {}: {}",
                        out.status,
                        String::from_utf8_lossy(&out.stderr).trim()
                    ));
                }
                Err(e) => last_error = Some(format!("{program}: {e}")),
            }
        }
        Err(NotifyError::driver(
            "audio",
            last_error.unwrap_or_else(|| "no audio player available".to_string()),
        ))
    }
}

fn player_commands(path: &str) -> Vec<(&'static str, Vec<String>)> {
    if cfg!(target_os = "macos") {
        vec![("afplay", vec![path.to_string()])]
    } else if cfg!(windows) {
        vec![(
            "powershell",
            vec![
                "-NoProfile".to_string(),
                "-Command".to_string(),
                "(New-Object Media.SoundPlayer $env:NOTIFY_WAV).PlaySync()".to_string(),
            ],
        )]
    } else {
        vec![
            ("paplay", vec![path.to_string()]),
            ("aplay", vec!["-q".to_string(), path.to_string()]),
        ]
    }
}

// ============================================================================
// Native output
// ============================================================================

#[cfg(feature = "native-audio")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioOutput;

#[cfg(feature = "native-audio")]
impl AudioOutput for RodioOutput {
    fn play(&self, pcm: &Pcm) -> Result<()> {
        use rodio::buffer::SamplesBuffer;
        use rodio::{OutputStream, Sink};

        let (_stream, handle) = OutputStream::try_default()
            .map_err(|e| NotifyError::driver("audio", format!("failed to open audio output: {e}")))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| NotifyError::driver("audio", format!("failed to create audio sink: {e}")))?;
        sink.append(SamplesBuffer::new(
            pcm.channels,
            pcm.sample_rate,
            pcm.samples.clone(),
        ));
        sink.sleep_until_end();
        Ok(())
    }
}
