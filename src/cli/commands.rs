//! Subcommand implementations. Library errors become `anyhow` here.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::channels::{DriverDeps, DriverSet, SpeechRequest};
use crate::cli::{
    ConfigAction, DashboardOpts, HistoryAction, HistoryOpts, HookOpts, SendOpts, TestOpts, VoiceAction, WatchOpts,
};
use crate::config::{
    validate_config, write_config_file, Config, Step, StepKind, CONFIG_FILE_NAME, DEFAULT_DASHBOARD_PORT,
};
use crate::dashboard::{self, DashboardState};
use crate::eventlog::{format, open_store, summarize_by_day, EventStore, RangeKind};
use crate::hooks::{claude_request, hook_request, shell_hook, Shell};
use crate::infra::host::pid_alive;
use crate::infra::idle::SystemIdleProbe;
use crate::infra::paths::DataPaths;
use crate::infra::silent::parse_duration;
use crate::routing::match_profile;
use crate::runner::{Mode, Runner};
use crate::trigger::{describe_step, Notifier, TriggerOutcome, TriggerRequest};
use crate::voice::VoiceCache;

const DEFAULT_HISTORY_COUNT: usize = 10;
const WATCH_POLL: Duration = Duration::from_millis(500);

/// Everything a command needs, built once per process.
pub struct App {
    pub config: Arc<Config>,
    pub paths: DataPaths,
    pub notifier: Notifier,
    pub voice_cache: Arc<VoiceCache>,
    deps: DriverDeps,
}

impl App {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = Arc::new(Config::load(config_path)?);
        let paths = DataPaths::resolve();
        paths
            .ensure()
            .with_context(|| format!("creating data directory {}", paths.root().display()))?;

        let store = open_store(config.options.storage, &paths)?;
        let deps = DriverDeps::new(&config, &paths)?;
        let voice_cache = deps.voice_cache.clone();
        let runner = Runner::new(DriverSet::builtin(deps.clone()));
        let notifier = Notifier::new(config.clone(), &paths, store, Arc::new(SystemIdleProbe), runner);
        Ok(Self {
            config,
            paths,
            notifier,
            voice_cache,
            deps,
        })
    }

    fn store(&self) -> &Arc<dyn EventStore> {
        self.notifier.store()
    }

    fn cwd_profile(&self) -> String {
        let cwd = std::env::current_dir().unwrap_or_default();
        match_profile(&self.config, &cwd)
    }
}

fn report(outcome: &TriggerOutcome) {
    match outcome {
        TriggerOutcome::Dispatched { profile, ran } => debug!(profile, ran, "dispatched"),
        TriggerOutcome::SkippedSilent => eprintln!("silent mode active, skipped"),
        TriggerOutcome::SkippedCooldown { seconds } => eprintln!("on cooldown ({seconds}s), skipped"),
    }
}

// ============================================================================
// Triggers
// ============================================================================

/// `notify <profile> <action> [--volume N]` or `notify <action>`.
pub async fn trigger(app: &App, args: &[String]) -> Result<()> {
    let mut positional = Vec::new();
    let mut volume = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(v) = arg.strip_prefix("--volume=") {
            volume = Some(v.parse::<u8>().context("invalid --volume")?);
        } else if arg == "--volume" {
            let v = iter.next().context("--volume needs a value")?;
            volume = Some(v.parse::<u8>().context("invalid --volume")?);
        } else {
            positional.push(arg.as_str());
        }
    }

    let (profile, action) = match positional.as_slice() {
        [action] => (app.cwd_profile(), action.to_string()),
        [profile, action] => (profile.to_string(), action.to_string()),
        _ => bail!("usage: notify <profile> <action> [--volume N]"),
    };
    let outcome = app
        .notifier
        .trigger(&TriggerRequest::new(&profile, &action).volume(volume))
        .await?;
    report(&outcome);
    Ok(())
}

pub async fn send(app: &App, opts: SendOpts) -> Result<()> {
    let kind: StepKind = opts.step_type.parse().map_err(anyhow::Error::msg)?;
    let mut step = Step::with_text(kind, &opts.message);
    match kind {
        StepKind::Toast | StepKind::Mqtt => step.message = Some(opts.message.clone()),
        StepKind::Sound => step.sound = Some(opts.message.clone()),
        StepKind::Webhook => step.url = Some(opts.message.clone()),
        StepKind::Plugin => step.command = Some(opts.message.clone()),
        _ => {}
    }
    app.notifier.send_step(step, opts.volume).await?;
    Ok(())
}

pub async fn hook(app: &App, opts: HookOpts) -> Result<()> {
    let threshold = app.config.options.shell_hook_threshold();
    let profile = app.cwd_profile();
    let Some(req) = hook_request(&profile, &opts.command, opts.seconds, opts.exit_code, threshold) else {
        return Ok(());
    };
    match app.notifier.trigger(&req).await {
        Ok(outcome) => report(&outcome),
        // The shell hook fires for every long command; a profile without
        // `done`/`error` is not an error.
        Err(e) if e.is_not_found() => debug!("{e}"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub async fn claude_hook(app: &App, profile: Option<String>) -> Result<()> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("reading hook payload from stdin")?;
    let profile = profile.unwrap_or_else(|| app.cwd_profile());
    let outcome = app.notifier.trigger(&claude_request(&profile, &raw)).await?;
    report(&outcome);
    Ok(())
}

pub async fn watch(app: &App, opts: WatchOpts) -> Result<()> {
    if !pid_alive(opts.pid) {
        bail!("no running process with pid {}", opts.pid);
    }
    let profile = opts.profile.unwrap_or_else(|| app.cwd_profile());
    info!(pid = opts.pid, "waiting for process to exit");
    let started = Instant::now();
    while pid_alive(opts.pid) {
        tokio::time::sleep(WATCH_POLL).await;
    }
    let req = TriggerRequest::new(&profile, &opts.action)
        .command(&format!("pid {}", opts.pid))
        .duration_secs(started.elapsed().as_secs());
    let outcome = app.notifier.trigger(&req).await?;
    report(&outcome);
    Ok(())
}

// ============================================================================
// Dashboard
// ============================================================================

pub async fn dashboard(app: App, opts: DashboardOpts) -> Result<()> {
    let port = opts.port.unwrap_or(DEFAULT_DASHBOARD_PORT);
    let state = DashboardState::new(app.notifier, app.paths, app.voice_cache);
    dashboard::serve(state, port).await?;
    Ok(())
}

// ============================================================================
// History
// ============================================================================

pub fn history(app: &App, opts: HistoryOpts) -> Result<()> {
    let store = app.store();
    match opts.action {
        None => {
            let entries = store.all_entries()?;
            let count = opts.count.unwrap_or(DEFAULT_HISTORY_COUNT);
            let skip = entries.len().saturating_sub(count);
            print!("{}", format::render(&entries[skip..]));
        }
        Some(HistoryAction::Summary { days }) => {
            let entries = store.entries(days)?;
            for day in summarize_by_day(&entries, days) {
                println!("{}  {} runs, {} skipped", day.date, day.executions, day.skipped);
                for s in &day.summaries {
                    println!("  {}/{}  {} runs, {} skipped", s.profile, s.action, s.executions, s.skipped);
                }
            }
        }
        Some(HistoryAction::Clean { days }) => {
            let removed = store.clean(days)?;
            println!("removed {removed} entries older than {days} days");
        }
        Some(HistoryAction::Export { days }) => {
            let entries = store.entries(days)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Some(HistoryAction::Watch { date, range }) => {
            let date = match date {
                Some(d) => NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                    .with_context(|| format!("invalid date '{d}' (want YYYY-MM-DD)"))?,
                None => Local::now().date_naive(),
            };
            let range: RangeKind = range.parse().map_err(anyhow::Error::msg)?;
            let view = dashboard::views::watch_view(&store.entries(0)?, date, range);
            println!(
                "{} {} .. {}  {} runs",
                view.range, view.breakdown.start, view.breakdown.end, view.breakdown.total
            );
            for b in &view.breakdown.buckets {
                println!("  {:<10} {:>5}  {:>5.1}%", b.label, b.total, b.percent);
            }
            for (profile, secs) in &view.time_spent.profiles {
                println!("  {profile}: ~{}m active", secs / 60);
            }
        }
        Some(HistoryAction::Remove { profile }) => {
            let removed = store.remove_profile(&profile)?;
            println!("removed {removed} entries for {profile}");
        }
        Some(HistoryAction::Clear) => {
            store.clear()?;
            println!("event log cleared");
        }
    }
    Ok(())
}

// ============================================================================
// Voice cache
// ============================================================================

pub async fn voice(app: &App, action: VoiceAction) -> Result<()> {
    let cache = &app.voice_cache;
    match action {
        VoiceAction::Stats => {
            let stats = cache.stats();
            println!("{} entries, {} bytes in {}", stats.count, stats.total_bytes, cache.dir().display());
        }
        VoiceAction::List => {
            for e in cache.entries() {
                println!("{}  {:>8}  {}  {}", e.hash, e.size_bytes, e.voice, e.text);
            }
        }
        VoiceAction::Generate { text, voice } => {
            let credentials = &app.config.options.credentials;
            let req = SpeechRequest {
                text: &text,
                voice: voice.as_deref(),
                volume: app.config.options.volume(),
                api_key: &credentials.openai_api_key,
            };
            let wav = app.deps.speech.render_wav(&req).await?;
            let entry = cache.add(&text, &app.deps.speech.voice_label(&req), &wav)?;
            println!("{}  {}", entry.hash, entry.path.display());
        }
        VoiceAction::Remove { hash } => {
            if !cache.remove(&hash)? {
                bail!("no cached voice with hash {hash}");
            }
        }
        VoiceAction::Clear => {
            let removed = cache.clear()?;
            println!("removed {removed} cached voices");
        }
    }
    Ok(())
}

// ============================================================================
// Silent mode
// ============================================================================

pub fn silent(app: &App, value: Option<&str>) -> Result<()> {
    let silent = app.notifier.silent();
    let logging = app.config.options.log;
    match value.unwrap_or("status") {
        "status" => match silent.silent_until() {
            Some(until) => println!("silent until {}", until.format("%Y-%m-%d %H:%M:%S")),
            None => println!("not silent"),
        },
        "off" => {
            silent.disable()?;
            if logging {
                if let Err(e) = app.store().log_silent_disable() {
                    warn!("failed to log silent disable: {e}");
                }
            }
            println!("silent mode off");
        }
        input => {
            let duration = parse_duration(input).map_err(anyhow::Error::msg)?;
            let until = silent.enable(duration)?;
            if logging {
                if let Err(e) = app.store().log_silent_enable(input) {
                    warn!("failed to log silent enable: {e}");
                }
            }
            println!("silent until {}", until.format("%Y-%m-%d %H:%M:%S"));
        }
    }
    Ok(())
}

// ============================================================================
// Config / list / test
// ============================================================================

/// Runs before any config is loaded: `init` and `validate` must work on a
/// broken or missing file.
pub fn config(config_path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Validate => {
            let config = Config::load(config_path)?;
            let problems = validate_config(&config);
            if problems.is_empty() {
                println!("config OK");
                return Ok(());
            }
            for p in &problems {
                println!("{p}");
            }
            bail!("{} problem(s) found", problems.len());
        }
        ConfigAction::Path => {
            let config = Config::load(config_path)?;
            if let Some(source) = &config.source {
                println!("{}", source.display());
            }
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(p) => p.to_path_buf(),
                None => DataPaths::resolve().root().join(CONFIG_FILE_NAME),
            };
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            write_config_file(&path, &Config::example())?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

pub fn list(app: &App) -> Result<()> {
    for (name, profile) in &app.config.profiles {
        let mut header = name.clone();
        if !profile.aliases.is_empty() {
            header.push_str(&format!(" (aliases: {})", profile.aliases.join(", ")));
        }
        if let Some(parent) = &profile.extends {
            header.push_str(&format!(" extends {parent}"));
        }
        println!("{header}");
        for (action_name, action) in &profile.actions {
            println!("  {action_name}");
            for step in &action.steps {
                println!("    {}", describe_step(step));
            }
        }
    }
    Ok(())
}

pub fn test(app: &App, opts: TestOpts) -> Result<()> {
    let mode: Mode = opts.mode.parse().map_err(anyhow::Error::msg)?;
    let profile = opts.profile.unwrap_or_else(|| app.cwd_profile());
    let Some(def) = app.config.profile(&profile) else {
        bail!("unknown profile '{profile}'");
    };
    for action in def.actions.keys() {
        let dry = app.notifier.dry_run(&profile, action, opts.afk, mode, opts.hour)?;
        println!(
            "{}/{}  (afk={}, mode={}, hour={})",
            dry.profile, dry.action, dry.afk, dry.mode, dry.hour
        );
        for (step, runs) in dry.steps.iter().zip(&dry.would_run) {
            let mark = if *runs { "run " } else { "skip" };
            println!("  {mark}  {}", describe_step(step));
        }
    }
    Ok(())
}

pub fn shell_hook_snippet(shell: &str) -> Result<()> {
    let shell: Shell = shell.parse().map_err(anyhow::Error::msg)?;
    let binary = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "notify".to_string());
    print!("{}", shell_hook(shell, &binary));
    Ok(())
}
