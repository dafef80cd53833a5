mod defaults;
mod io;
mod redact;
mod types;
mod validation;

pub use defaults::*;
pub use io::*;
pub use redact::*;
pub use types::*;
pub use validation::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{NotifyError, Result};

/// Top-level configuration document.
///
/// Loaded once per process and treated as immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default, rename = "config")]
    pub options: Options,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,

    /// File the configuration was read from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the explicit path, else `NOTIFY_CONFIG`, else
    /// next to the binary, else the per-user data directory.
    ///
    /// Fails with `ConfigNotFound` if none exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let data_dir = resolve_data_dir();
        Self::load_from(path, &data_dir)
    }

    /// Same as [`Config::load`] with an explicit data directory.
    pub fn load_from(path: Option<&Path>, data_dir: &Path) -> Result<Self> {
        let candidates = config_search_paths(path, data_dir);
        let found = find_config_file(&candidates)
            .ok_or(NotifyError::ConfigNotFound { searched: candidates })?;

        info!("Loading config from {}", found.display());
        let mut config = load_config_file(&found)?;
        config.source = Some(found);
        Ok(config)
    }

    /// A small working configuration used by `config init`-style flows and tests.
    pub fn example() -> Self {
        let mut default = Profile::default();
        default.actions.insert(
            "ready".to_string(),
            Action::new(vec![Step::sound("ready"), Step::say("{Profile} ready")]),
        );
        default.actions.insert(
            "done".to_string(),
            Action::new(vec![
                Step::sound("done"),
                Step::say("{Profile} done").when("present"),
                Step::toast("{command} finished in {duration}").when("afk"),
            ]),
        );
        default.actions.insert(
            "error".to_string(),
            Action::new(vec![Step::sound("error"), Step::say("{Profile} failed")]),
        );

        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), default);

        Self {
            options: Options::default(),
            profiles,
            source: None,
        }
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }
}
