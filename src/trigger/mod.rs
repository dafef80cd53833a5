//! The trigger pipeline shared by the CLI, the shell hook and the dashboard.
//!
//! resolve → silent gate → cooldown gate → AFK probe → template vars →
//! credentials → filter → execute → record cooldown → log.

use chrono::{Local, Timelike};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{Config, Step, DEFAULT_PROFILE};
use crate::error::Result;
use crate::eventlog::{format, EventStore};
use crate::infra::cooldown::CooldownStore;
use crate::infra::host::hostname;
use crate::infra::idle::{is_afk, IdleProbe};
use crate::infra::paths::DataPaths;
use crate::infra::silent::SilentState;
use crate::routing::{merge_credentials, resolve};
use crate::runner::{filter_steps, filtered_indices, Mode, RunContext, Runner};
use crate::template::TemplateVars;

// ============================================================================
// Request / outcome
// ============================================================================

/// One trigger of `(profile, action)` with optional template overrides.
#[derive(Debug, Clone, Default)]
pub struct TriggerRequest {
    pub profile: String,
    pub action: String,
    pub mode: Mode,
    pub command: Option<String>,
    pub duration_secs: Option<u64>,
    pub output: Option<String>,
    pub claude_hook: Option<String>,
    pub claude_message: Option<String>,
    pub claude_json: Option<String>,
    /// Overrides the configured default volume.
    pub volume: Option<u8>,
}

impl TriggerRequest {
    pub fn new(profile: &str, action: &str) -> Self {
        Self {
            profile: profile.to_string(),
            action: action.to_string(),
            ..Default::default()
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.command = Some(command.to_string());
        self
    }

    pub fn duration_secs(mut self, seconds: u64) -> Self {
        self.duration_secs = Some(seconds);
        self
    }

    pub fn volume(mut self, volume: Option<u8>) -> Self {
        self.volume = volume.map(|v| v.min(100));
        self
    }

    fn apply(&self, mut vars: TemplateVars) -> TemplateVars {
        if let Some(command) = &self.command {
            vars = vars.with_command(command);
        }
        if let Some(seconds) = self.duration_secs {
            vars = vars.with_duration_secs(seconds);
        }
        let set = |slot: &mut String, value: &Option<String>| {
            if let Some(v) = value {
                *slot = v.clone();
            }
        };
        set(&mut vars.output, &self.output);
        set(&mut vars.claude_hook, &self.claude_hook);
        set(&mut vars.claude_message, &self.claude_message);
        set(&mut vars.claude_json, &self.claude_json);
        vars
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Dispatched { profile: String, ran: usize },
    SkippedSilent,
    SkippedCooldown { seconds: u64 },
}

/// What a trigger would do, without dispatching anything.
#[derive(Debug, Clone, Serialize)]
pub struct DryRun {
    pub profile: String,
    pub action: String,
    pub afk: bool,
    pub mode: String,
    pub hour: u32,
    pub would_run: Vec<bool>,
    pub steps: Vec<Step>,
}

// ============================================================================
// Notifier
// ============================================================================

/// Owns everything a trigger touches.
#[derive(Clone)]
pub struct Notifier {
    config: Arc<Config>,
    store: Arc<dyn EventStore>,
    cooldown: CooldownStore,
    silent: SilentState,
    idle: Arc<dyn IdleProbe>,
    runner: Runner,
    hostname: String,
}

impl Notifier {
    pub fn new(
        config: Arc<Config>,
        paths: &DataPaths,
        store: Arc<dyn EventStore>,
        idle: Arc<dyn IdleProbe>,
        runner: Runner,
    ) -> Self {
        Self {
            config,
            store,
            cooldown: CooldownStore::new(paths.cooldown_file()),
            silent: SilentState::new(paths.silent_file()),
            idle,
            runner,
            hostname: hostname(),
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn silent(&self) -> &SilentState {
        &self.silent
    }

    fn logging(&self) -> bool {
        self.config.options.log
    }

    fn best_effort(&self, what: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!("failed to {what}: {e}");
        }
    }

    /// Run the full pipeline. Driver errors are returned after the cooldown
    /// record and the log entry have been written.
    pub async fn trigger(&self, req: &TriggerRequest) -> Result<TriggerOutcome> {
        let config = &*self.config;
        let resolved = resolve(config, &req.profile, &req.action)?;
        let profile = resolved.profile.as_str();
        let action = resolved.action_name.as_str();

        if self.silent.is_silent() {
            info!(profile, action, "silent mode active, skipping");
            if self.logging() {
                self.best_effort("log silent skip", self.store.log_silent(profile, action));
            }
            return Ok(TriggerOutcome::SkippedSilent);
        }

        let cooldown_secs = resolved.cooldown_seconds(config);
        let cooldown_applies = cooldown_secs > 0
            && (config.options.cooldown || resolved.action.cooldown_seconds.is_some());
        if cooldown_applies && self.cooldown.check(profile, action, cooldown_secs) {
            info!(profile, action, seconds = cooldown_secs, "on cooldown, skipping");
            if self.logging() {
                self.best_effort(
                    "log cooldown skip",
                    self.store.log_cooldown(profile, action, cooldown_secs),
                );
            }
            return Ok(TriggerOutcome::SkippedCooldown {
                seconds: cooldown_secs,
            });
        }

        let afk = is_afk(self.idle.as_ref(), config.options.afk_threshold());
        let now = Local::now();
        let mut vars = req.apply(TemplateVars::new(profile, &self.hostname, now));
        vars.action = action.to_string();
        let credentials = resolved.credentials(config);

        let steps = filter_steps(&resolved.action.steps, afk, req.mode, now.hour());
        debug!(
            profile,
            action,
            afk,
            mode = %req.mode,
            kept = steps.len(),
            total = resolved.action.steps.len(),
            "filtered steps"
        );

        let result = self
            .runner
            .execute(
                &steps,
                RunContext {
                    vars: &vars,
                    credentials: &credentials,
                    default_volume: req.volume.unwrap_or_else(|| config.options.volume()),
                },
            )
            .await;

        if cooldown_applies {
            self.best_effort("record cooldown", self.cooldown.record(profile, action));
            if self.logging() {
                self.best_effort(
                    "log cooldown record",
                    self.store.log_cooldown_record(profile, action, cooldown_secs),
                );
            }
        }
        if self.logging() {
            let desktop = resolved.desktop(config);
            self.best_effort(
                "log execution",
                self.store.log(action, &steps, afk, &vars, desktop),
            );
        }

        result.map(|()| TriggerOutcome::Dispatched {
            profile: profile.to_string(),
            ran: steps.len(),
        })
    }

    /// Dispatch one ad-hoc step with the default profile's credentials. Gates
    /// do not apply; the execution is logged as `default/send`.
    pub async fn send_step(&self, step: Step, volume: Option<u8>) -> Result<()> {
        let config = &*self.config;
        let credentials = merge_credentials(
            &config.options.credentials,
            config.profile(DEFAULT_PROFILE).and_then(|p| p.credentials.as_ref()),
        );
        let mut vars = TemplateVars::new(DEFAULT_PROFILE, &self.hostname, Local::now());
        vars.action = "send".to_string();
        let steps = [step];

        let result = self
            .runner
            .execute(
                &steps,
                RunContext {
                    vars: &vars,
                    credentials: &credentials,
                    default_volume: volume.unwrap_or_else(|| config.options.volume()),
                },
            )
            .await;
        if self.logging() {
            self.best_effort("log execution", self.store.log("send", &steps, false, &vars, None));
        }
        result
    }

    /// Evaluate the step filters for `(profile, action)` without dispatching.
    /// `afk` and `hour` default to the live values.
    pub fn dry_run(
        &self,
        profile: &str,
        action: &str,
        afk: Option<bool>,
        mode: Mode,
        hour: Option<u32>,
    ) -> Result<DryRun> {
        let config = &*self.config;
        let resolved = resolve(config, profile, action)?;
        let afk = afk.unwrap_or_else(|| is_afk(self.idle.as_ref(), config.options.afk_threshold()));
        let hour = hour.unwrap_or_else(|| Local::now().hour());
        Ok(DryRun {
            profile: resolved.profile.clone(),
            action: resolved.action_name.clone(),
            afk,
            mode: mode.to_string(),
            hour,
            would_run: filtered_indices(&resolved.action.steps, afk, mode, hour),
            steps: resolved.action.steps.clone(),
        })
    }
}

/// Short description of a step for listings.
pub fn describe_step(step: &Step) -> String {
    let detail = format::step_detail(step);
    match step.when.as_deref().filter(|w| !w.is_empty()) {
        Some(when) => format!("{} {detail} (when {when})", step.step_type),
        None => format!("{} {detail}", step.step_type),
    }
}
