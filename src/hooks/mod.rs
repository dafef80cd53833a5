//! Integrations that trigger actions on someone else's schedule: the shell
//! precmd hook and the AI-assistant hook.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::runner::Mode;
use crate::trigger::TriggerRequest;

// ============================================================================
// Shell hook
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl FromStr for Shell {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bash" => Ok(Shell::Bash),
            "zsh" => Ok(Shell::Zsh),
            "fish" => Ok(Shell::Fish),
            other => Err(format!("unsupported shell '{other}' (want bash, zsh or fish)")),
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
        })
    }
}

const BASH_HOOK: &str = r#"# notify shell hook (bash)
__notify_preexec() {
  [ -n "$COMP_LINE" ] && return
  [ "$BASH_COMMAND" = "$PROMPT_COMMAND" ] && return
  if [ -z "$__notify_cmd" ]; then
    __notify_cmd="$BASH_COMMAND"
    __notify_start=$SECONDS
  fi
}
__notify_precmd() {
  local exit_code=$?
  if [ -n "$__notify_cmd" ]; then
    ( "__NOTIFY_BIN__" _hook --command "$__notify_cmd" --seconds $((SECONDS - __notify_start)) --exit $exit_code >/dev/null 2>&1 & )
  fi
  __notify_cmd=""
}
trap '__notify_preexec' DEBUG
PROMPT_COMMAND="__notify_precmd${PROMPT_COMMAND:+;$PROMPT_COMMAND}"
"#;

const ZSH_HOOK: &str = r#"# notify shell hook (zsh)
autoload -Uz add-zsh-hook
__notify_preexec() {
  __notify_cmd="$1"
  __notify_start=$EPOCHSECONDS
}
__notify_precmd() {
  local exit_code=$?
  if [[ -n "$__notify_cmd" ]]; then
    ( "__NOTIFY_BIN__" _hook --command "$__notify_cmd" --seconds $((EPOCHSECONDS - __notify_start)) --exit $exit_code >/dev/null 2>&1 & )
  fi
  __notify_cmd=""
}
zmodload zsh/datetime
add-zsh-hook preexec __notify_preexec
add-zsh-hook precmd __notify_precmd
"#;

const FISH_HOOK: &str = r#"# notify shell hook (fish)
function __notify_postexec --on-event fish_postexec
    set -l exit_code $status
    set -l seconds (math --scale=0 "$CMD_DURATION / 1000")
    "__NOTIFY_BIN__" _hook --command "$argv[1]" --seconds $seconds --exit $exit_code >/dev/null 2>&1 &
    disown
end
"#;

/// Precmd snippet for `shell`, calling `binary _hook` after each command.
pub fn shell_hook(shell: Shell, binary: &str) -> String {
    let template = match shell {
        Shell::Bash => BASH_HOOK,
        Shell::Zsh => ZSH_HOOK,
        Shell::Fish => FISH_HOOK,
    };
    template.replace("__NOTIFY_BIN__", binary)
}

/// Action for a finished command, or `None` when it ran shorter than
/// `threshold` seconds.
pub fn hook_action(seconds: u64, exit_code: i32, threshold: u64) -> Option<&'static str> {
    if seconds < threshold {
        return None;
    }
    Some(if exit_code == 0 { "done" } else { "error" })
}

/// Trigger for a command that finished in the shell.
pub fn hook_request(profile: &str, command: &str, seconds: u64, exit_code: i32, threshold: u64) -> Option<TriggerRequest> {
    let action = hook_action(seconds, exit_code, threshold)?;
    Some(
        TriggerRequest::new(profile, action)
            .mode(Mode::Run)
            .command(command)
            .duration_secs(seconds),
    )
}

// ============================================================================
// AI-assistant hook
// ============================================================================

/// The fields of the assistant's hook payload that matter here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaudePayload {
    #[serde(default)]
    pub hook_event_name: String,
    #[serde(default)]
    pub message: String,
}

/// `Stop` → `done`, `Notification` → `ready`, anything else → `done`.
pub fn claude_action(hook_event_name: &str) -> &'static str {
    match hook_event_name {
        "Notification" => "ready",
        _ => "done",
    }
}

/// Build a trigger from the raw payload. Unparseable JSON still triggers
/// `done`, with the raw text exported as `NOTIFY_CLAUDE_JSON`.
pub fn claude_request(profile: &str, raw: &str) -> TriggerRequest {
    let payload: ClaudePayload = serde_json::from_str(raw).unwrap_or_default();
    let mut req = TriggerRequest::new(profile, claude_action(&payload.hook_event_name));
    req.claude_hook = Some(payload.hook_event_name).filter(|s| !s.is_empty());
    req.claude_message = Some(payload.message).filter(|s| !s.is_empty());
    req.claude_json = Some(raw.trim().to_string()).filter(|s| !s.is_empty());
    req
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_commands_do_not_trigger() {
        assert_eq!(hook_action(5, 0, 30), None);
        assert_eq!(hook_action(30, 0, 30), Some("done"));
        assert_eq!(hook_action(45, 2, 30), Some("error"));
    }

    #[test]
    fn hook_request_runs_in_run_mode() {
        let req = hook_request("work", "cargo build", 95, 0, 30).unwrap();
        assert_eq!(req.action, "done");
        assert_eq!(req.mode, Mode::Run);
        assert_eq!(req.command.as_deref(), Some("cargo build"));
        assert_eq!(req.duration_secs, Some(95));
    }

    #[test]
    fn snippets_call_the_hook_subcommand() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            let s = shell_hook(shell, "/usr/local/bin/notify");
            assert!(s.contains("/usr/local/bin/notify\" _hook --command"), "{shell}");
            assert!(!s.contains("__NOTIFY_BIN__"));
        }
        assert!("tcsh".parse::<Shell>().is_err());
    }

    #[test]
    fn claude_payload_mapping() {
        let req = claude_request("boss", r#"{"hook_event_name":"Notification","message":"Needs input"}"#);
        assert_eq!(req.action, "ready");
        assert_eq!(req.claude_hook.as_deref(), Some("Notification"));
        assert_eq!(req.claude_message.as_deref(), Some("Needs input"));

        assert_eq!(claude_request("boss", r#"{"hook_event_name":"Stop"}"#).action, "done");
        assert_eq!(claude_request("boss", r#"{"hook_event_name":"SubagentStop"}"#).action, "done");

        let garbage = claude_request("boss", "not json");
        assert_eq!(garbage.action, "done");
        assert_eq!(garbage.claude_json.as_deref(), Some("not json"));
    }
}
