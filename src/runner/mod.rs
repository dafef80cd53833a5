//! Step filtering and dispatch.
//!
//! Filtered steps are split into two lanes. The audio lane (`sound`, `say`)
//! runs strictly in order because it owns the output device; every other step
//! is launched concurrently alongside it.

use futures::future::join_all;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::channels::{Delivery, DriverSet};
use crate::config::{Credentials, Step, When};
use crate::error::{NotifyError, Result};
use crate::template::{expand, TemplateVars};

// ============================================================================
// Invocation mode
// ============================================================================

/// How the trigger was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Invoked by the user (CLI, dashboard).
    #[default]
    Direct,
    /// Invoked by the shell hook after a command finished.
    Run,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Direct => "direct",
            Mode::Run => "run",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "" | "direct" => Ok(Mode::Direct),
            "run" => Ok(Mode::Run),
            other => Err(format!("unknown mode '{other}' (want direct or run)")),
        }
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Whether `hour` falls in `start..=end`, wrapping past midnight when
/// `start > end`.
pub fn hour_in_range(hour: u32, start: u8, end: u8) -> bool {
    let (start, end) = (u32::from(start), u32::from(end));
    if start <= end {
        start <= hour && hour <= end
    } else {
        hour >= start || hour <= end
    }
}

/// Evaluate a step's `when` predicate. A malformed predicate never matches.
pub fn step_applies(step: &Step, afk: bool, mode: Mode, hour: u32) -> bool {
    match step.when_predicate() {
        Some(When::Always) => true,
        Some(When::Afk) => afk,
        Some(When::Present) => !afk,
        Some(When::Run) => mode == Mode::Run,
        Some(When::Direct) => mode == Mode::Direct,
        Some(When::Hours(start, end)) => hour_in_range(hour, start, end),
        None => false,
    }
}

/// Ordered subset of `steps` whose predicates hold.
pub fn filter_steps(steps: &[Step], afk: bool, mode: Mode, hour: u32) -> Vec<Step> {
    steps
        .iter()
        .filter(|s| step_applies(s, afk, mode, hour))
        .cloned()
        .collect()
}

/// Same decision as [`filter_steps`], aligned with the input list.
pub fn filtered_indices(steps: &[Step], afk: bool, mode: Mode, hour: u32) -> Vec<bool> {
    steps
        .iter()
        .map(|s| step_applies(s, afk, mode, hour))
        .collect()
}

/// Copy of `step` with human-facing fields expanded. URLs, headers,
/// credentials, broker settings and plugin commands are left as configured.
pub fn expand_step(step: &Step, vars: &TemplateVars) -> Step {
    let expand_opt = |field: &Option<String>| field.as_deref().map(|s| expand(s, vars));
    Step {
        text: expand_opt(&step.text),
        title: expand_opt(&step.title),
        message: expand_opt(&step.message),
        body: expand_opt(&step.body),
        ..step.clone()
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Per-invocation inputs shared by every step.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub vars: &'a TemplateVars,
    pub credentials: &'a Credentials,
    pub default_volume: u8,
}

/// Dispatches filtered steps through a [`DriverSet`].
#[derive(Clone)]
pub struct Runner {
    drivers: DriverSet,
}

impl Runner {
    pub fn new(drivers: DriverSet) -> Self {
        Self { drivers }
    }

    pub fn drivers(&self) -> &DriverSet {
        &self.drivers
    }

    /// Run already-filtered steps. Returns the first audio-lane error, else the
    /// first parallel-lane error, else success. All parallel steps run to
    /// completion regardless.
    pub async fn execute(&self, steps: &[Step], ctx: RunContext<'_>) -> Result<()> {
        let expanded: Vec<Step> = steps.iter().map(|s| expand_step(s, ctx.vars)).collect();

        let mut audio = Vec::new();
        let mut parallel = Vec::new();
        for (i, (original, step)) in steps.iter().zip(&expanded).enumerate() {
            let lane_is_audio = step.kind().map(|k| k.is_audio_lane()).unwrap_or(false);
            let job = (i + 1, original, step);
            if lane_is_audio {
                audio.push(job);
            } else {
                parallel.push(job);
            }
        }
        debug!(audio = audio.len(), parallel = parallel.len(), "dispatching steps");

        let audio_lane = async {
            for (index, original, step) in audio {
                self.run_step(index, original, step, ctx).await?;
            }
            Ok::<(), NotifyError>(())
        };
        let parallel_lane = join_all(
            parallel
                .into_iter()
                .map(|(index, original, step)| self.run_step(index, original, step, ctx)),
        );

        let (audio_result, parallel_results) = tokio::join!(audio_lane, parallel_lane);
        audio_result?;
        parallel_results.into_iter().collect::<Result<Vec<()>>>()?;
        Ok(())
    }

    async fn run_step(
        &self,
        index: usize,
        original: &Step,
        step: &Step,
        ctx: RunContext<'_>,
    ) -> Result<()> {
        let result = self.dispatch(original, step, ctx).await;
        if let Err(e) = &result {
            warn!(step = index, kind = %step.step_type, "step failed: {e}");
        }
        result
    }

    async fn dispatch(&self, original: &Step, step: &Step, ctx: RunContext<'_>) -> Result<()> {
        let kind = step.kind().ok_or_else(|| {
            NotifyError::driver(step.step_type.as_str(), format!("unknown step type '{}'", step.step_type))
        })?;
        let driver = self
            .drivers
            .get(kind)
            .ok_or_else(|| NotifyError::driver(kind.as_str(), "no driver registered"))?;

        let delivery = Delivery {
            step,
            original,
            vars: ctx.vars,
            credentials: ctx.credentials,
            volume: step.effective_volume(ctx.default_volume),
        };
        driver.send(&delivery).await
    }
}
