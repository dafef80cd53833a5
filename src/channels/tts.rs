//! Speech engines and WAV rendering for voice steps.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

use super::driver::{check_response, Delivery, ExternalCommand};
use crate::config::{Options, TtsProvider, OPENAI_API_BASE, OPENAI_DEFAULT_VOICE};
use crate::error::{NotifyError, Result};
use crate::media::{wav, AudioContext};
use crate::voice::VoiceCache;

/// One utterance.
#[derive(Debug, Clone, Copy)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    /// Voice override from the step; engines fall back to their own default.
    pub voice: Option<&'a str>,
    pub volume: u8,
    /// OpenAI key from the merged credentials (may be empty).
    pub api_key: &'a str,
}

impl<'a> SpeechRequest<'a> {
    pub fn from_delivery(delivery: &Delivery<'a>) -> Self {
        Self {
            text: delivery.text(),
            voice: delivery.step.voice.as_deref().filter(|v| !v.is_empty()),
            volume: delivery.volume,
            api_key: &delivery.credentials.openai_api_key,
        }
    }
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Speak aloud and return once finished.
    async fn speak(&self, req: &SpeechRequest<'_>) -> Result<()>;

    /// Render to WAV bytes without playing.
    async fn render_wav(&self, req: &SpeechRequest<'_>) -> Result<Vec<u8>>;

    /// Voice name recorded in the voice cache.
    fn voice_label(&self, req: &SpeechRequest<'_>) -> String;
}

/// Engine selected by `tts_provider`.
pub fn speech_engine(
    options: &Options,
    http: reqwest::Client,
    audio: Arc<AudioContext>,
) -> Arc<dyn SpeechEngine> {
    match options.tts_provider {
        TtsProvider::System => Arc::new(SystemSpeech::new(&options.tts_voice, options.tts_rate)),
        TtsProvider::OpenAi => Arc::new(OpenAiSpeech::new(
            http,
            audio,
            OPENAI_API_BASE,
            &options.tts_voice,
        )),
    }
}

// ============================================================================
// System speech
// ============================================================================

/// OS speech: `say` on macOS, `espeak-ng`/`espeak` on Linux, System.Speech on
/// Windows. Text always travels as an argument or environment value.
pub struct SystemSpeech {
    voice: String,
    /// Words per minute; 0 keeps the engine default.
    rate: i64,
}

impl SystemSpeech {
    pub fn new(voice: &str, rate: i64) -> Self {
        Self {
            voice: voice.to_string(),
            rate,
        }
    }

    /// Candidate commands for this platform, in preference order.
    pub fn commands(&self, req: &SpeechRequest<'_>, out: Option<&Path>) -> Vec<ExternalCommand> {
        let voice = req.voice.unwrap_or(&self.voice);
        if cfg!(target_os = "macos") {
            vec![macos_say(req, voice, self.rate, out)]
        } else if cfg!(windows) {
            vec![windows_speech(req, voice, self.rate, out)]
        } else {
            ["espeak-ng", "espeak"]
                .into_iter()
                .map(|program| espeak(program, req, voice, self.rate, out))
                .collect()
        }
    }

    async fn run(&self, req: &SpeechRequest<'_>, out: Option<&Path>) -> Result<()> {
        let mut last_error = String::from("no speech command available");
        for cmd in self.commands(req, out) {
            let result = Command::new(&cmd.program)
                .args(&cmd.args)
                .envs(cmd.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .output()
                .await;
            match result {
                Ok(output) if output.status.success() => return Ok(()),
                Ok(output) => {
                    last_error = format!(
                        "{} exited with {}: {}",
                        cmd.program,
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                Err(e) => last_error = format!("{}: {e}", cmd.program),
            }
        }
        Err(NotifyError::driver("say", last_error))
    }
}

fn macos_say(req: &SpeechRequest<'_>, voice: &str, rate: i64, out: Option<&Path>) -> ExternalCommand {
    let mut args = Vec::new();
    if !voice.is_empty() {
        args.extend(["-v".to_string(), voice.to_string()]);
    }
    if rate > 0 {
        args.extend(["-r".to_string(), rate.to_string()]);
    }
    if let Some(out) = out {
        args.extend([
            "-o".to_string(),
            out.display().to_string(),
            "--data-format=LEI16@22050".to_string(),
        ]);
    }
    // `say` has no volume flag; the embedded command scales this utterance.
    let text = if req.volume < 100 && out.is_none() {
        format!("[[volm {:.2}]] {}", req.volume as f32 / 100.0, req.text)
    } else {
        req.text.to_string()
    };
    args.push("--".to_string());
    args.push(text);
    ExternalCommand {
        program: "say".to_string(),
        args,
        envs: Vec::new(),
    }
}

fn espeak(
    program: &str,
    req: &SpeechRequest<'_>,
    voice: &str,
    rate: i64,
    out: Option<&Path>,
) -> ExternalCommand {
    let mut args = Vec::new();
    if !voice.is_empty() {
        args.extend(["-v".to_string(), voice.to_string()]);
    }
    if rate > 0 {
        args.extend(["-s".to_string(), rate.to_string()]);
    }
    // espeak amplitude runs 0-200 with 100 as normal.
    args.extend(["-a".to_string(), req.volume.min(100).to_string()]);
    if let Some(out) = out {
        args.extend(["-w".to_string(), out.display().to_string()]);
    }
    args.push("--".to_string());
    args.push(req.text.to_string());
    ExternalCommand {
        program: program.to_string(),
        args,
        envs: Vec::new(),
    }
}

const WINDOWS_SPEECH_SCRIPT: &str = "Add-Type -AssemblyName System.Speech; \
$s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
if ($env:NOTIFY_TTS_VOICE) { $s.SelectVoice($env:NOTIFY_TTS_VOICE) }; \
$s.Rate = [int]$env:NOTIFY_TTS_RATE; \
$s.Volume = [int]$env:NOTIFY_TTS_VOLUME; \
if ($env:NOTIFY_TTS_OUT) { $s.SetOutputToWaveFile($env:NOTIFY_TTS_OUT) }; \
$s.Speak($env:NOTIFY_TTS_TEXT); $s.Dispose()";

fn windows_speech(
    req: &SpeechRequest<'_>,
    voice: &str,
    rate: i64,
    out: Option<&Path>,
) -> ExternalCommand {
    // SpeechSynthesizer.Rate is -10..10 around roughly 175 wpm.
    let sapi_rate = if rate > 0 {
        ((rate - 175) / 25).clamp(-10, 10)
    } else {
        0
    };
    let mut envs = vec![
        ("NOTIFY_TTS_TEXT".to_string(), req.text.to_string()),
        ("NOTIFY_TTS_VOICE".to_string(), voice.to_string()),
        ("NOTIFY_TTS_RATE".to_string(), sapi_rate.to_string()),
        ("NOTIFY_TTS_VOLUME".to_string(), req.volume.min(100).to_string()),
    ];
    if let Some(out) = out {
        envs.push(("NOTIFY_TTS_OUT".to_string(), out.display().to_string()));
    }
    ExternalCommand {
        program: "powershell".to_string(),
        args: vec![
            "-NoProfile".to_string(),
            "-Command".to_string(),
            WINDOWS_SPEECH_SCRIPT.to_string(),
        ],
        envs,
    }
}

#[async_trait]
impl SpeechEngine for SystemSpeech {
    fn name(&self) -> &str {
        "system"
    }

    async fn speak(&self, req: &SpeechRequest<'_>) -> Result<()> {
        debug!(engine = "system", len = req.text.len(), "speaking");
        self.run(req, None).await
    }

    async fn render_wav(&self, req: &SpeechRequest<'_>) -> Result<Vec<u8>> {
        let out = tempfile::Builder::new()
            .prefix("notify-tts-")
            .suffix(".wav")
            .tempfile()?;
        let full = SpeechRequest { volume: 100, ..*req };
        self.run(&full, Some(out.path())).await?;
        Ok(tokio::fs::read(out.path()).await?)
    }

    fn voice_label(&self, req: &SpeechRequest<'_>) -> String {
        req.voice.unwrap_or(&self.voice).to_string()
    }
}

// ============================================================================
// OpenAI speech
// ============================================================================

/// `POST /v1/audio/speech` with `response_format=wav`.
pub struct OpenAiSpeech {
    http: reqwest::Client,
    audio: Arc<AudioContext>,
    base_url: String,
    voice: String,
    model: String,
}

impl OpenAiSpeech {
    pub fn new(http: reqwest::Client, audio: Arc<AudioContext>, base_url: &str, voice: &str) -> Self {
        Self {
            http,
            audio,
            base_url: base_url.trim_end_matches('/').to_string(),
            voice: if voice.is_empty() {
                OPENAI_DEFAULT_VOICE.to_string()
            } else {
                voice.to_string()
            },
            model: "tts-1".to_string(),
        }
    }
}

#[async_trait]
impl SpeechEngine for OpenAiSpeech {
    fn name(&self) -> &str {
        "openai"
    }

    async fn speak(&self, req: &SpeechRequest<'_>) -> Result<()> {
        let bytes = self.render_wav(req).await?;
        let pcm = wav::load_for_output(&bytes, req.volume)?;
        self.audio.play(pcm).await
    }

    async fn render_wav(&self, req: &SpeechRequest<'_>) -> Result<Vec<u8>> {
        if req.api_key.is_empty() {
            return Err(NotifyError::missing("say", "openai_api_key"));
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": req.text,
            "voice": req.voice.unwrap_or(&self.voice),
            "response_format": "wav",
        });
        debug!(engine = "openai", len = req.text.len(), "requesting speech");

        let resp = self
            .http
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(req.api_key)
            .json(&body)
            .send()
            .await?;
        let resp = check_response("openai", resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    fn voice_label(&self, req: &SpeechRequest<'_>) -> String {
        req.voice.unwrap_or(&self.voice).to_string()
    }
}

// ============================================================================
// WAV rendering with the voice cache
// ============================================================================

/// Produces WAV bytes for voice attachments, preferring the voice cache.
#[derive(Clone)]
pub struct VoiceRenderer {
    pub speech: Arc<dyn SpeechEngine>,
    pub cache: Arc<VoiceCache>,
}

impl VoiceRenderer {
    pub fn new(speech: Arc<dyn SpeechEngine>, cache: Arc<VoiceCache>) -> Self {
        Self { speech, cache }
    }

    /// Cached WAV path for this delivery, when caching applies.
    pub fn cached(&self, delivery: &Delivery<'_>) -> Option<std::path::PathBuf> {
        if delivery.text_is_templated() {
            return None;
        }
        self.cache.lookup(delivery.text())
    }

    pub async fn wav_for(&self, delivery: &Delivery<'_>) -> Result<Vec<u8>> {
        if let Some(path) = self.cached(delivery) {
            debug!(path = %path.display(), "voice cache hit");
            return Ok(tokio::fs::read(&path).await?);
        }
        self.speech
            .render_wav(&SpeechRequest::from_delivery(delivery))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(text: &str) -> SpeechRequest<'_> {
        SpeechRequest {
            text,
            voice: None,
            volume: 80,
            api_key: "",
        }
    }

    #[test]
    fn text_is_passed_as_a_single_argument() {
        let engine = SystemSpeech::new("", 0);
        let hostile = "done; rm -rf / $(whoami)";
        for cmd in engine.commands(&req(hostile), None) {
            let in_args = cmd.args.iter().any(|a| a.ends_with(hostile));
            let in_env = cmd.envs.iter().any(|(_, v)| v == hostile);
            assert!(in_args || in_env, "{cmd:?}");
        }
    }

    #[test]
    fn voice_override_wins() {
        let engine = SystemSpeech::new("default-voice", 0);
        let r = SpeechRequest {
            voice: Some("other"),
            ..req("hi")
        };
        assert_eq!(engine.voice_label(&r), "other");
        assert_eq!(engine.voice_label(&req("hi")), "default-voice");
    }

    #[test]
    fn espeak_gets_rate_and_output() {
        let cmd = espeak("espeak-ng", &req("hi"), "en", 180, Some(Path::new("/tmp/x.wav")));
        assert_eq!(
            cmd.args,
            vec!["-v", "en", "-s", "180", "-a", "80", "-w", "/tmp/x.wav", "--", "hi"]
        );
    }

    #[tokio::test]
    async fn openai_requires_api_key() {
        let engine = OpenAiSpeech::new(
            reqwest::Client::new(),
            AudioContext::shared(),
            "http://127.0.0.1:9",
            "",
        );
        let err = engine.render_wav(&req("hi")).await.unwrap_err();
        assert!(matches!(err, NotifyError::CredentialMissing { .. }));
    }
}
