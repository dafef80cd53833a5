use std::path::{Path, PathBuf};
use tracing::debug;

use super::defaults::{APP_DIR_NAME, CONFIG_FILE_NAME};
use super::Config;
use crate::error::{NotifyError, Result};

/// Maximum size for a config file (10 MB).
pub const MAX_CONFIG_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Resolve the per-user data directory.
///
/// `NOTIFY_DATA_DIR` wins; otherwise `<platform data dir>/notify`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NOTIFY_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".notify"))
}

/// Candidate config paths in search order.
///
/// Explicit path, then `NOTIFY_CONFIG`, then the file next to the binary,
/// then the data directory.
pub fn config_search_paths(explicit: Option<&Path>, data_dir: &Path) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }

    let mut candidates = Vec::new();
    if let Ok(env_path) = std::env::var("NOTIFY_CONFIG") {
        if !env_path.is_empty() {
            candidates.push(PathBuf::from(env_path));
        }
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir.join(CONFIG_FILE_NAME));
    }
    candidates.push(data_dir.join(CONFIG_FILE_NAME));
    candidates
}

/// Return the first existing candidate.
pub fn find_config_file(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_file()).cloned()
}

/// Read and parse a config file.
///
/// JSON5 is tried first so comments and trailing commas are accepted; when
/// that fails the strict JSON error is reported since it carries the better
/// line/column message.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let metadata = std::fs::metadata(path)?;
    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        return Err(NotifyError::ConfigParse {
            path: path.to_path_buf(),
            message: format!(
                "file is {} bytes, exceeds limit of {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_BYTES
            ),
        });
    }

    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content).map_err(|message| NotifyError::ConfigParse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse config text (JSON or JSON5).
pub fn parse_config_str(content: &str) -> std::result::Result<Config, String> {
    match json5::from_str::<Config>(content) {
        Ok(config) => Ok(config),
        Err(json5_err) => {
            debug!("json5 parse failed ({json5_err}), retrying as strict JSON");
            serde_json::from_str::<Config>(content).map_err(|e| e.to_string())
        }
    }
}

/// Write configuration to a JSON file.
pub fn write_config_file(path: &Path, config: &Config) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    crate::infra::fs::write_atomic(path, content.as_bytes())
}
