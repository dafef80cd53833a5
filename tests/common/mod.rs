//! Shared fixtures: a notifier wired to recording audio and speech fakes.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

use devnotify::channels::{
    AudioConverter, DriverDeps, DriverSet, FfmpegConverter, SpeechEngine, SpeechRequest,
};
use devnotify::config::Config;
use devnotify::eventlog::open_store;
use devnotify::infra::idle::FixedIdle;
use devnotify::infra::paths::DataPaths;
use devnotify::media::{wav, AudioContext, AudioOutput, Pcm};
use devnotify::runner::Runner;
use devnotify::trigger::Notifier;
use devnotify::voice::VoiceCache;
use devnotify::Result;

/// Records the peak amplitude of every buffer played.
#[derive(Default)]
pub struct RecordingOutput {
    pub peaks: Mutex<Vec<i16>>,
}

impl AudioOutput for RecordingOutput {
    fn play(&self, pcm: &Pcm) -> Result<()> {
        let peak = pcm.samples.iter().map(|s| s.saturating_abs()).max().unwrap_or(0);
        self.peaks.lock().push(peak);
        Ok(())
    }
}

/// Speech engine that records what it was asked to say.
#[derive(Default)]
pub struct FakeSpeech {
    pub spoken: Mutex<Vec<String>>,
    pub rendered: Mutex<Vec<String>>,
}

/// One tenth of a second of constant-amplitude stereo at the output rate.
pub fn test_wav(amplitude: i16) -> Vec<u8> {
    let mut pcm = Pcm::output();
    pcm.samples = vec![amplitude; 4410 * 2];
    wav::encode(&pcm)
}

#[async_trait]
impl SpeechEngine for FakeSpeech {
    fn name(&self) -> &str {
        "fake"
    }

    async fn speak(&self, req: &SpeechRequest<'_>) -> Result<()> {
        self.spoken.lock().push(req.text.to_string());
        Ok(())
    }

    async fn render_wav(&self, req: &SpeechRequest<'_>) -> Result<Vec<u8>> {
        self.rendered.lock().push(req.text.to_string());
        Ok(test_wav(1000))
    }

    fn voice_label(&self, _req: &SpeechRequest<'_>) -> String {
        "fake".to_string()
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub paths: DataPaths,
    pub notifier: Notifier,
    pub voice_cache: Arc<VoiceCache>,
    pub output: Arc<RecordingOutput>,
    pub speech: Arc<FakeSpeech>,
}

pub struct HarnessOptions {
    pub idle_secs: u64,
    pub telegram_api_base: String,
    /// `None` means no converter can be found.
    pub converter: Option<Arc<dyn AudioConverter>>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            idle_secs: 0,
            telegram_api_base: "http://127.0.0.1:9".to_string(),
            converter: None,
        }
    }
}

pub fn harness(config: Config) -> Harness {
    harness_with(config, HarnessOptions::default())
}

pub fn harness_with(config: Config, opts: HarnessOptions) -> Harness {
    let dir = TempDir::new().unwrap();
    let paths = DataPaths::new(dir.path());
    paths.ensure().unwrap();

    let output = Arc::new(RecordingOutput::default());
    let speech = Arc::new(FakeSpeech::default());
    let voice_cache = Arc::new(VoiceCache::open(paths.root()));
    let converter = opts.converter.unwrap_or_else(|| {
        let empty = dir.path().join("empty-path");
        std::fs::create_dir_all(&empty).unwrap();
        let missing: Arc<dyn AudioConverter> =
            Arc::new(FfmpegConverter::with_search_path(empty.into_os_string()));
        missing
    });

    let deps = DriverDeps {
        http: reqwest::Client::new(),
        audio: Arc::new(AudioContext::new(output.clone())),
        speech: speech.clone(),
        converter,
        voice_cache: voice_cache.clone(),
        telegram_api_base: String::new(),
    }
    .with_telegram_api_base(&opts.telegram_api_base);

    let config = Arc::new(config);
    let store = open_store(config.options.storage, &paths).unwrap();
    let notifier = Notifier::new(
        config,
        &paths,
        store,
        Arc::new(FixedIdle(opts.idle_secs)),
        Runner::new(DriverSet::builtin(deps)),
    );

    Harness {
        dir,
        paths,
        notifier,
        voice_cache,
        output,
        speech,
    }
}

/// Parse a config document written the way users write it.
pub fn config_from_json(json: &str) -> Config {
    devnotify::config::parse_config_str(json).unwrap()
}
