//! Desktop notification through the platform's command-line tool.

use async_trait::async_trait;
use tokio::process::Command;

use super::driver::{ChannelDriver, Delivery, ExternalCommand};
use crate::error::{NotifyError, Result};
use crate::template::title_case;

pub struct ToastDriver;

const OSASCRIPT: &str =
    "on run argv\ndisplay notification (item 2 of argv) with title (item 1 of argv)\nend run";

const WINDOWS_TOAST_SCRIPT: &str = "[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] > $null; \
$t = [Windows.UI.Notifications.ToastNotificationManager]::GetTemplateContent([Windows.UI.Notifications.ToastTemplateType]::ToastText02); \
$x = $t.GetElementsByTagName('text'); \
$x.Item(0).AppendChild($t.CreateTextNode($env:NOTIFY_TOAST_TITLE)) > $null; \
$x.Item(1).AppendChild($t.CreateTextNode($env:NOTIFY_TOAST_MESSAGE)) > $null; \
[Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('notify').Show([Windows.UI.Notifications.ToastNotification]::new($t))";

/// Title shown when the step has none.
pub fn default_title(profile: &str) -> String {
    if profile.is_empty() {
        "notify".to_string()
    } else {
        title_case(profile)
    }
}

/// Build the toast command. Title and message are passed as argv entries or
/// environment values, never spliced into a script.
pub fn toast_command(title: &str, message: &str) -> ExternalCommand {
    if cfg!(target_os = "macos") {
        ExternalCommand {
            program: "osascript".to_string(),
            args: vec![
                "-e".to_string(),
                OSASCRIPT.to_string(),
                title.to_string(),
                message.to_string(),
            ],
            envs: Vec::new(),
        }
    } else if cfg!(windows) {
        ExternalCommand {
            program: "powershell".to_string(),
            args: vec![
                "-NoProfile".to_string(),
                "-Command".to_string(),
                WINDOWS_TOAST_SCRIPT.to_string(),
            ],
            envs: vec![
                ("NOTIFY_TOAST_TITLE".to_string(), title.to_string()),
                ("NOTIFY_TOAST_MESSAGE".to_string(), message.to_string()),
            ],
        }
    } else {
        ExternalCommand {
            program: "notify-send".to_string(),
            args: vec![
                "--app-name=notify".to_string(),
                "--".to_string(),
                title.to_string(),
                message.to_string(),
            ],
            envs: Vec::new(),
        }
    }
}

#[async_trait]
impl ChannelDriver for ToastDriver {
    async fn send(&self, delivery: &Delivery<'_>) -> Result<()> {
        let message = delivery.step.message.as_deref().unwrap_or("");
        let title = match delivery.step.title.as_deref() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => default_title(&delivery.vars.profile),
        };

        let cmd = toast_command(&title, message);
        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .envs(cmd.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .await
            .map_err(|e| NotifyError::driver("toast", format!("{}: {e}", cmd.program)))?;
        if !output.status.success() {
            return Err(NotifyError::driver(
                "toast",
                format!(
                    "{} exited with {}: {}",
                    cmd.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_and_message_stay_separate_values() {
        let cmd = toast_command("Boss", "it's \"done\"; echo pwned");
        let carried = cmd.args.iter().chain(cmd.envs.iter().map(|(_, v)| v));
        let values: Vec<&String> = carried.collect();
        assert!(values.iter().any(|v| v.as_str() == "Boss"));
        assert!(values
            .iter()
            .any(|v| v.as_str() == "it's \"done\"; echo pwned"));
    }

    #[test]
    fn default_title_is_title_cased_profile() {
        assert_eq!(default_title("boss"), "Boss");
        assert_eq!(default_title(""), "notify");
    }
}
