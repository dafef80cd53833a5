use super::{Config, Credentials};

/// Placeholder written over every non-empty secret.
pub const REDACTED: &str = "***";

/// Return a copy of `config` with every credential string replaced by `***`.
///
/// Empty values stay empty so the caller can still tell "set" from "unset".
/// The input is never modified.
pub fn redact_config(config: &Config) -> Config {
    let mut out = config.clone();
    redact_credentials(&mut out.options.credentials);
    for profile in out.profiles.values_mut() {
        if let Some(creds) = profile.credentials.as_mut() {
            redact_credentials(creds);
        }
        for action in profile.actions.values_mut() {
            for step in &mut action.steps {
                if let Some(password) = step.password.as_mut() {
                    redact_value(password);
                }
                // Header names stay visible; values often carry bearer tokens.
                for value in step.headers.iter_mut().flat_map(|h| h.values_mut()) {
                    redact_value(value);
                }
            }
        }
    }
    out
}

fn redact_credentials(creds: &mut Credentials) {
    for value in creds.fields_mut() {
        redact_value(value);
    }
}

fn redact_value(value: &mut String) {
    if !value.is_empty() {
        *value = REDACTED.to_string();
    }
}
