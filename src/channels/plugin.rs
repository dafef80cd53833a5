//! User-defined commands.
//!
//! The command string is run verbatim by the shell and never template
//! expanded. Dynamic values reach it only through `NOTIFY_*` environment
//! variables.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::driver::{ChannelDriver, Delivery};
use crate::config::DEFAULT_PLUGIN_TIMEOUT_SECS;
use crate::error::{NotifyError, Result};
use crate::template::TemplateVars;

#[derive(Debug, Default, Clone, Copy)]
pub struct PluginDriver;

/// Environment passed to the plugin. The first group is always present; the
/// rest only when non-empty.
pub fn plugin_env(vars: &TemplateVars, text: &str) -> Vec<(&'static str, String)> {
    let mut env = vec![
        ("NOTIFY_PROFILE", vars.profile.clone()),
        ("NOTIFY_HOSTNAME", vars.hostname.clone()),
        ("NOTIFY_TIME", vars.time.clone()),
        ("NOTIFY_DATE", vars.date.clone()),
    ];
    let optional = [
        ("NOTIFY_ACTION", vars.action.as_str()),
        ("NOTIFY_TEXT", text),
        ("NOTIFY_COMMAND", vars.command.as_str()),
        ("NOTIFY_DURATION", vars.duration.as_str()),
        ("NOTIFY_DURATION_SAY", vars.duration_say.as_str()),
        ("NOTIFY_OUTPUT", vars.output.as_str()),
        ("NOTIFY_CLAUDE_MESSAGE", vars.claude_message.as_str()),
        ("NOTIFY_CLAUDE_HOOK", vars.claude_hook.as_str()),
        ("NOTIFY_CLAUDE_JSON", vars.claude_json.as_str()),
    ];
    env.extend(
        optional
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k, v.to_string())),
    );
    env
}

/// Effective timeout: unset means the default, 0 means none.
pub fn effective_timeout(configured: Option<u64>) -> Option<Duration> {
    match configured.unwrap_or(DEFAULT_PLUGIN_TIMEOUT_SECS) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

#[async_trait]
impl ChannelDriver for PluginDriver {
    async fn send(&self, delivery: &Delivery<'_>) -> Result<()> {
        // Read from the configured step: commands are never expanded.
        let command = delivery
            .original
            .command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| NotifyError::driver("plugin", "step has no 'command'"))?;
        let text = delivery
            .step
            .text
            .as_deref()
            .or(delivery.step.message.as_deref())
            .unwrap_or("");

        let mut cmd = shell_command(command);
        cmd.envs(plugin_env(delivery.vars, text))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            NotifyError::driver("plugin", format!("failed to start '{command}': {e}"))
        })?;

        let output = match effective_timeout(delivery.step.timeout) {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                // Dropping the future drops the child, which kills it.
                Err(_) => {
                    return Err(NotifyError::Timeout {
                        command: command.to_string(),
                        seconds: limit.as_secs(),
                    })
                }
            },
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NotifyError::driver(
                "plugin",
                format!("'{command}' exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, Step, StepKind};

    fn vars() -> TemplateVars {
        TemplateVars {
            profile: "boss".into(),
            action: "done".into(),
            hostname: "devbox".into(),
            time: "10:00".into(),
            date: "2026-10-16".into(),
            command: "make; rm -rf ~".into(),
            ..Default::default()
        }
    }

    #[test]
    fn env_has_required_and_non_empty_optional_vars() {
        let env = plugin_env(&vars(), "hi");
        let keys: Vec<&str> = env.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                "NOTIFY_PROFILE",
                "NOTIFY_HOSTNAME",
                "NOTIFY_TIME",
                "NOTIFY_DATE",
                "NOTIFY_ACTION",
                "NOTIFY_TEXT",
                "NOTIFY_COMMAND",
            ]
        );
    }

    #[test]
    fn timeout_defaults_and_zero_means_unbounded() {
        assert_eq!(
            effective_timeout(None),
            Some(Duration::from_secs(DEFAULT_PLUGIN_TIMEOUT_SECS))
        );
        assert_eq!(effective_timeout(Some(0)), None);
        assert_eq!(effective_timeout(Some(3)), Some(Duration::from_secs(3)));
    }

    fn plugin_step(command: &str, timeout: Option<u64>) -> Step {
        Step {
            command: Some(command.to_string()),
            timeout,
            ..Step::new(StepKind::Plugin)
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_sees_env_not_expansion() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        let step = plugin_step(
            &format!("printf '%s|%s' \"$NOTIFY_PROFILE\" \"$NOTIFY_COMMAND\" > '{}'", out.display()),
            None,
        );
        let v = vars();
        let creds = Credentials::default();
        let delivery = Delivery {
            step: &step,
            original: &step,
            vars: &v,
            credentials: &creds,
            volume: 100,
        };
        PluginDriver.send(&delivery).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(out).unwrap(),
            "boss|make; rm -rf ~"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let step = plugin_step("sleep 5", Some(1));
        let v = vars();
        let creds = Credentials::default();
        let delivery = Delivery {
            step: &step,
            original: &step,
            vars: &v,
            credentials: &creds,
            volume: 100,
        };
        let err = PluginDriver.send(&delivery).await.unwrap_err();
        assert!(matches!(err, NotifyError::Timeout { seconds: 1, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let step = plugin_step("echo broken >&2; exit 3", None);
        let v = vars();
        let creds = Credentials::default();
        let delivery = Delivery {
            step: &step,
            original: &step,
            vars: &v,
            credentials: &creds,
            volume: 100,
        };
        let err = PluginDriver.send(&delivery).await.unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
