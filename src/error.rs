//! Error taxonomy shared by every subsystem.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigProblem;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no config file found (searched: {})", display_paths(.searched))]
    ConfigNotFound { searched: Vec<PathBuf> },

    #[error("failed to parse config '{}': {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("config is invalid:\n{}", display_problems(.0))]
    ConfigInvalid(Vec<ConfigProblem>),

    #[error("no action '{action}' for profile '{profile}' (checked aliases, extends chain and default)")]
    ResolveMiss { profile: String, action: String },

    #[error("{channel}: missing credential '{field}'")]
    CredentialMissing { channel: String, field: String },

    #[error("{channel}: {message}")]
    Driver { channel: String, message: String },

    #[error("plugin timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("event log write failed: {0}")]
    LogWrite(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NotifyError {
    pub fn driver(channel: impl Into<String>, message: impl Into<String>) -> Self {
        NotifyError::Driver {
            channel: channel.into(),
            message: message.into(),
        }
    }

    pub fn missing(channel: impl Into<String>, field: impl Into<String>) -> Self {
        NotifyError::CredentialMissing {
            channel: channel.into(),
            field: field.into(),
        }
    }

    /// Process exit code for this error. Every surfaced failure maps to 1.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// True for errors the dashboard reports as 400.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, NotifyError::InvalidInput(_))
    }

    /// True for errors the dashboard reports as 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NotifyError::ResolveMiss { .. })
    }
}

pub type Result<T, E = NotifyError> = std::result::Result<T, E>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_problems(problems: &[ConfigProblem]) -> String {
    problems
        .iter()
        .map(|p| format!("  - {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_invalid_lists_every_problem() {
        let e = NotifyError::ConfigInvalid(vec![
            ConfigProblem::new("config.default_volume", "must be between 0 and 100"),
            ConfigProblem::new("profiles.boss.done[0].type", "unknown step type 'beep'"),
        ]);
        let text = e.to_string();
        assert!(text.contains("default_volume"));
        assert!(text.contains("unknown step type 'beep'"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn resolve_miss_is_not_found() {
        let e = NotifyError::ResolveMiss {
            profile: "boss".into(),
            action: "nope".into(),
        };
        assert!(e.is_not_found());
        assert_eq!(e.exit_code(), 1);
        assert!(!NotifyError::driver("slack", "500").is_not_found());
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: NotifyError = io_err.into();
        assert!(e.to_string().contains("io error"));
    }
}
