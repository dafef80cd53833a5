use std::collections::HashSet;

use super::{Config, Credentials, Step, StepKind, TtsProvider, When};

/// A single validation problem, addressed by a dotted config path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigProblem {
    pub path: String,
    pub message: String,
}

impl ConfigProblem {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate a configuration and return every problem found.
///
/// Does not stop at the first problem.
pub fn validate_config(config: &Config) -> Vec<ConfigProblem> {
    let mut problems = Vec::new();
    let opts = &config.options;

    if !(0..=100).contains(&opts.default_volume) {
        problems.push(ConfigProblem::new(
            "config.default_volume",
            format!("must be between 0 and 100, got {}", opts.default_volume),
        ));
    }
    for (path, value) in [
        ("config.afk_threshold_seconds", opts.afk_threshold_seconds),
        ("config.cooldown_seconds", opts.cooldown_seconds),
        ("config.shell_hook_threshold", opts.shell_hook_threshold),
    ] {
        if value < 0 {
            problems.push(ConfigProblem::new(path, format!("must be >= 0, got {value}")));
        }
    }

    validate_aliases(config, &mut problems);
    validate_extends(config, &mut problems);

    for (name, profile) in &config.profiles {
        let creds = crate::routing::merge_credentials(
            &config.options.credentials,
            profile.credentials.as_ref(),
        );

        for (action_name, action) in &profile.actions {
            let action_path = format!("profiles.{name}.{action_name}");
            if action.steps.is_empty() {
                problems.push(ConfigProblem::new(&action_path, "action has no steps"));
            }
            if let Some(secs) = action.cooldown_seconds {
                if secs < 0 {
                    problems.push(ConfigProblem::new(
                        format!("{action_path}.cooldown_seconds"),
                        format!("must be >= 0, got {secs}"),
                    ));
                }
            }
            for (i, step) in action.steps.iter().enumerate() {
                validate_step(
                    &format!("{action_path}[{i}]"),
                    step,
                    &creds,
                    opts.tts_provider,
                    &mut problems,
                );
            }
        }
    }

    problems
}

fn validate_step(
    path: &str,
    step: &Step,
    creds: &Credentials,
    tts_provider: TtsProvider,
    problems: &mut Vec<ConfigProblem>,
) {
    if let Some(volume) = step.volume {
        if !(0..=100).contains(&volume) {
            problems.push(ConfigProblem::new(
                format!("{path}.volume"),
                format!("must be between 0 and 100, got {volume}"),
            ));
        }
    }

    if let Some(when) = step.when.as_deref() {
        if let Err(e) = when.parse::<When>() {
            problems.push(ConfigProblem::new(format!("{path}.when"), e));
        }
    }

    let kind = match step.step_type.parse::<StepKind>() {
        Ok(kind) => kind,
        Err(e) => {
            problems.push(ConfigProblem::new(format!("{path}.type"), e));
            return;
        }
    };

    let required: &[(&str, &Option<String>)] = match kind {
        StepKind::Sound => &[("sound", &step.sound)],
        StepKind::Toast => &[("message", &step.message)],
        StepKind::Say
        | StepKind::Discord
        | StepKind::DiscordVoice
        | StepKind::Slack
        | StepKind::Telegram
        | StepKind::TelegramAudio
        | StepKind::TelegramVoice => &[("text", &step.text)],
        StepKind::Webhook => &[("url", &step.url)],
        StepKind::Mqtt => &[
            ("broker", &step.broker),
            ("topic", &step.topic),
            ("message", &step.message),
        ],
        StepKind::Plugin => &[("command", &step.command)],
    };
    for (field, value) in required {
        if value.as_deref().map(str::trim).unwrap_or("").is_empty() {
            problems.push(ConfigProblem::new(
                format!("{path}.{field}"),
                format!("'{kind}' step requires '{field}'"),
            ));
        }
    }

    if kind == StepKind::Mqtt {
        if let Some(qos) = step.qos {
            if qos > 1 {
                problems.push(ConfigProblem::new(
                    format!("{path}.qos"),
                    format!("qos must be 0 or 1, got {qos}"),
                ));
            }
        }
    }

    for field in kind.required_credentials() {
        if !creds.has(field) {
            problems.push(ConfigProblem::new(
                format!("{path}.type"),
                format!("'{kind}' step needs credential '{field}'"),
            ));
        }
    }
    for field in kind.speech_credentials(tts_provider) {
        if !creds.has(field) {
            problems.push(ConfigProblem::new(
                format!("{path}.type"),
                format!("'{kind}' step needs credential '{field}' for openai speech"),
            ));
        }
    }
}

fn validate_aliases(config: &Config, problems: &mut Vec<ConfigProblem>) {
    let mut seen: HashSet<&str> = HashSet::new();
    for (name, profile) in &config.profiles {
        for alias in &profile.aliases {
            if config.profiles.contains_key(alias) {
                problems.push(ConfigProblem::new(
                    format!("profiles.{name}.aliases"),
                    format!("alias '{alias}' collides with a profile name"),
                ));
            } else if !seen.insert(alias.as_str()) {
                problems.push(ConfigProblem::new(
                    format!("profiles.{name}.aliases"),
                    format!("alias '{alias}' is declared by more than one profile"),
                ));
            }
        }
    }
}

fn validate_extends(config: &Config, problems: &mut Vec<ConfigProblem>) {
    for (name, profile) in &config.profiles {
        let Some(parent) = profile.extends.as_deref() else {
            continue;
        };
        if !config.profiles.contains_key(parent) {
            problems.push(ConfigProblem::new(
                format!("profiles.{name}.extends"),
                format!("extends unknown profile '{parent}'"),
            ));
            continue;
        }
        if let Err(cycle) = crate::routing::extends_chain(config, name) {
            problems.push(ConfigProblem::new(
                format!("profiles.{name}.extends"),
                format!("extends cycle: {}", cycle.join(" -> ")),
            ));
        }
    }
}
