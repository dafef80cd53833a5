//! Profile and action resolution.
//!
//! Resolves which profile handles an action (direct name, alias, `extends`
//! chain, then `default`), merges credentials along the way, and picks a
//! profile for a working directory from the configured match rules.

use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::config::{Action, Config, Credentials, MatchRule, Profile, DEFAULT_PROFILE};
use crate::error::{NotifyError, Result};

// ============================================================================
// Types
// ============================================================================

/// Result of resolving `(profile, action)`.
#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    /// Profile the caller asked for, after alias lookup.
    pub requested: String,
    /// Profile where the action was actually found.
    pub profile: String,
    pub action_name: String,
    pub action: &'a Action,
    /// Profile record of `profile`.
    pub profile_def: &'a Profile,
}

impl Resolved<'_> {
    /// Global credentials overlaid with the resolved profile's own.
    pub fn credentials(&self, config: &Config) -> Credentials {
        merge_credentials(&config.options.credentials, self.profile_def.credentials.as_ref())
    }

    /// Virtual desktop of the requested profile, else of the resolved one.
    pub fn desktop(&self, config: &Config) -> Option<u32> {
        config
            .profile(&self.requested)
            .and_then(|p| p.desktop)
            .or(self.profile_def.desktop)
    }

    /// Effective cooldown seconds for this action (action override over global).
    pub fn cooldown_seconds(&self, config: &Config) -> u64 {
        self.action
            .cooldown_seconds
            .map(|s| s.max(0) as u64)
            .unwrap_or_else(|| config.options.cooldown_secs())
    }
}

// ============================================================================
// Core Functions
// ============================================================================

/// Find the profile name an alias refers to. Profiles are scanned in name order.
pub fn lookup_alias<'a>(config: &'a Config, alias: &str) -> Option<&'a str> {
    config
        .profiles
        .iter()
        .find(|(_, p)| p.aliases.iter().any(|a| a == alias))
        .map(|(name, _)| name.as_str())
}

/// Walk `extends` from `start`, returning the visited names in order.
///
/// Returns the offending chain as `Err` when a cycle is found. Unknown
/// parents end the chain.
pub fn extends_chain(config: &Config, start: &str) -> std::result::Result<Vec<String>, Vec<String>> {
    let mut chain = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = Some(start);

    while let Some(name) = current {
        let Some(profile) = config.profiles.get(name) else {
            break;
        };
        if !visited.insert(name) {
            chain.push(name.to_string());
            return Err(chain);
        }
        chain.push(name.to_string());
        current = profile.extends.as_deref();
    }

    Ok(chain)
}

/// Resolve `(profile, action)`.
///
/// 1. `profile` names a profile directly, else
/// 2. it is an alias, then
/// 3. the `extends` chain of that profile is searched for the action, then
/// 4. the `default` profile is consulted.
pub fn resolve<'a>(config: &'a Config, profile: &str, action: &str) -> Result<Resolved<'a>> {
    let requested = if config.profiles.contains_key(profile) {
        Some(profile)
    } else {
        lookup_alias(config, profile)
    };

    if let Some(requested) = requested {
        let def = &config.profiles[requested];
        if let Some(found) = def.actions.get(action) {
            debug!(requested, action, "resolved action");
            return Ok(Resolved {
                requested: requested.to_string(),
                profile: requested.to_string(),
                action_name: action.to_string(),
                action: found,
                profile_def: def,
            });
        }

        let chain = extends_chain(config, requested).map_err(|cycle| {
            NotifyError::ConfigInvalid(vec![crate::config::ConfigProblem::new(
                format!("profiles.{requested}.extends"),
                format!("extends cycle: {}", cycle.join(" -> ")),
            )])
        })?;

        for name in chain.iter().skip(1) {
            let def = &config.profiles[name.as_str()];
            if let Some(found) = def.actions.get(action) {
                debug!(requested, resolved = %name, action, "resolved action");
                return Ok(Resolved {
                    requested: requested.to_string(),
                    profile: name.clone(),
                    action_name: action.to_string(),
                    action: found,
                    profile_def: def,
                });
            }
        }
    }

    if let Some(def) = config.profiles.get(DEFAULT_PROFILE) {
        if let Some(found) = def.actions.get(action) {
            debug!(requested = profile, action, "action resolved through default profile");
            return Ok(Resolved {
                requested: requested.unwrap_or(DEFAULT_PROFILE).to_string(),
                profile: DEFAULT_PROFILE.to_string(),
                action_name: action.to_string(),
                action: found,
                profile_def: def,
            });
        }
    }

    Err(NotifyError::ResolveMiss {
        profile: profile.to_string(),
        action: action.to_string(),
    })
}

/// Field-by-field overlay: profile values win when non-empty.
pub fn merge_credentials(global: &Credentials, profile: Option<&Credentials>) -> Credentials {
    let mut merged = global.clone();
    let Some(overlay) = profile else {
        return merged;
    };

    let overlay_values = [
        &overlay.discord_webhook,
        &overlay.slack_webhook,
        &overlay.telegram_token,
        &overlay.telegram_chat_id,
        &overlay.openai_api_key,
    ];
    for (target, value) in merged.fields_mut().into_iter().zip(overlay_values) {
        if !value.is_empty() {
            *target = value.clone();
        }
    }
    merged
}

/// Pick the profile for `cwd`: the first profile (in name order) whose match
/// rule is satisfied, else `default`.
pub fn match_profile(config: &Config, cwd: &Path) -> String {
    match_profile_with(config, cwd, |key| std::env::var(key).ok())
}

/// [`match_profile`] with an injectable environment lookup.
pub fn match_profile_with<F>(config: &Config, cwd: &Path, env: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    for (name, profile) in &config.profiles {
        if let Some(rule) = &profile.match_rule {
            if matches_rule(rule, cwd, &env) {
                debug!(profile = %name, cwd = %cwd.display(), "profile matched");
                return name.clone();
            }
        }
    }
    DEFAULT_PROFILE.to_string()
}

/// Check one match rule. A rule with neither field never matches; with both,
/// both must hold.
fn matches_rule<F>(rule: &MatchRule, cwd: &Path, env: &F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    if rule.dir.is_none() && rule.env.is_none() {
        return false;
    }

    if let Some(dir) = rule.dir.as_deref() {
        let dir = crate::infra::fs::expand_home(dir);
        if !cwd.starts_with(&dir) {
            return false;
        }
    }

    if let Some(spec) = rule.env.as_deref() {
        let satisfied = match spec.split_once('=') {
            Some((key, expected)) => env(key).as_deref() == Some(expected),
            None => env(spec).map(|v| !v.is_empty()).unwrap_or(false),
        };
        if !satisfied {
            return false;
        }
    }

    true
}
