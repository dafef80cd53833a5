//! WAV to OGG/Opus conversion for Telegram voice bubbles.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{NotifyError, Result};

#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Fail early when the converter cannot run at all.
    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    async fn wav_to_ogg(&self, wav: &[u8]) -> Result<Vec<u8>>;
}

/// Converts through an `ffmpeg` found on the search path.
pub struct FfmpegConverter {
    /// Overrides `PATH` for the lookup when set.
    search_path: Option<OsString>,
}

impl FfmpegConverter {
    pub fn new() -> Self {
        Self { search_path: None }
    }

    pub fn with_search_path(path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(path.into()),
        }
    }

    pub fn locate(&self) -> Option<PathBuf> {
        let path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))?;
        find_executable("ffmpeg", &path)
    }
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// First `name` on `path` that is a regular file.
pub fn find_executable(name: &str, path: &OsString) -> Option<PathBuf> {
    let candidates: Vec<String> = if cfg!(windows) {
        vec![format!("{name}.exe"), name.to_string()]
    } else {
        vec![name.to_string()]
    };
    std::env::split_paths(path).find_map(|dir| {
        candidates
            .iter()
            .map(|c| dir.join(c))
            .find(|p| p.is_file())
    })
}

fn missing_ffmpeg() -> NotifyError {
    NotifyError::driver(
        "telegram_voice",
        "WAV to OGG converter not available: ffmpeg was not found on PATH",
    )
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    fn ensure_available(&self) -> Result<()> {
        self.locate().map(|_| ()).ok_or_else(missing_ffmpeg)
    }

    async fn wav_to_ogg(&self, wav: &[u8]) -> Result<Vec<u8>> {
        let ffmpeg = self.locate().ok_or_else(missing_ffmpeg)?;

        let input = tempfile::Builder::new()
            .prefix("notify-voice-")
            .suffix(".wav")
            .tempfile()?;
        tokio::fs::write(input.path(), wav).await?;
        let output = tempfile::Builder::new()
            .prefix("notify-voice-")
            .suffix(".ogg")
            .tempfile()?;

        let result = Command::new(&ffmpeg)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(input.path())
            .args(["-c:a", "libopus", "-b:a", "32k", "-f", "ogg"])
            .arg(output.path())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| NotifyError::driver("telegram_voice", format!("ffmpeg: {e}")))?;
        if !result.status.success() {
            return Err(NotifyError::driver(
                "telegram_voice",
                format!(
                    "ffmpeg exited with {}: {}",
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            ));
        }
        Ok(tokio::fs::read(output.path()).await?)
    }
}
