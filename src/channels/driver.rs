use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Credentials, Step, StepKind, HTTP_TIMEOUT_SECS};
use crate::error::{NotifyError, Result};
use crate::template::TemplateVars;

/// Everything a driver needs to deliver one step.
#[derive(Debug, Clone, Copy)]
pub struct Delivery<'a> {
    /// Step with human-facing fields already expanded.
    pub step: &'a Step,
    /// Step as configured, used to tell templated text from literal text.
    pub original: &'a Step,
    pub vars: &'a TemplateVars,
    pub credentials: &'a Credentials,
    /// Effective volume, 0-100.
    pub volume: u8,
}

impl<'a> Delivery<'a> {
    pub fn text(&self) -> &'a str {
        self.step.text.as_deref().unwrap_or("")
    }

    /// True when the configured text contained placeholders.
    pub fn text_is_templated(&self) -> bool {
        self.original
            .text
            .as_deref()
            .map(crate::template::has_dynamic)
            .unwrap_or(false)
    }

    /// Non-empty credential `field`, else `CredentialMissing` for `channel`.
    pub fn credential(&self, channel: &str, field: &str) -> Result<&'a str> {
        match self.credentials.get(field) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(NotifyError::missing(channel, field)),
        }
    }
}

/// One delivery channel.
#[async_trait]
pub trait ChannelDriver: Send + Sync {
    /// Deliver the step. Errors are reported by the caller; drivers stay quiet.
    async fn send(&self, delivery: &Delivery<'_>) -> Result<()>;
}

/// Drivers keyed by step type.
#[derive(Clone, Default)]
pub struct DriverSet {
    drivers: HashMap<StepKind, Arc<dyn ChannelDriver>>,
}

impl DriverSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace (or add) the driver for one step type.
    pub fn with_driver(mut self, kind: StepKind, driver: Arc<dyn ChannelDriver>) -> Self {
        self.drivers.insert(kind, driver);
        self
    }

    pub fn get(&self, kind: StepKind) -> Option<&Arc<dyn ChannelDriver>> {
        self.drivers.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = StepKind> + '_ {
        self.drivers.keys().copied()
    }
}

/// A fully prepared subprocess: program, argv and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

/// Shared HTTP client for every network driver.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(concat!("notify/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Maximum response body bytes quoted in a driver error.
const ERROR_BODY_LIMIT: usize = 200;

/// Turn a non-2xx response into a `Driver` error quoting the body.
pub async fn check_response(channel: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.bytes().await.unwrap_or_default();
    let snippet = String::from_utf8_lossy(&body[..body.len().min(ERROR_BODY_LIMIT)])
        .trim()
        .to_string();
    Err(NotifyError::driver(
        channel,
        format!("HTTP {}: {snippet}", status.as_u16()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    #[async_trait]
    impl ChannelDriver for Nop {
        async fn send(&self, _delivery: &Delivery<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn with_driver_overrides() {
        let set = DriverSet::empty().with_driver(StepKind::Slack, Arc::new(Nop));
        assert!(set.get(StepKind::Slack).is_some());
        assert!(set.get(StepKind::Discord).is_none());
        assert_eq!(set.kinds().count(), 1);
    }

    #[test]
    fn credential_lookup_reports_missing_field() {
        let step = Step::with_text(StepKind::Slack, "hi");
        let vars = TemplateVars::default();
        let creds = Credentials {
            slack_webhook: "https://hooks.slack.test/x".into(),
            ..Default::default()
        };
        let d = Delivery {
            step: &step,
            original: &step,
            vars: &vars,
            credentials: &creds,
            volume: 100,
        };
        assert_eq!(
            d.credential("slack", "slack_webhook").unwrap(),
            "https://hooks.slack.test/x"
        );
        let err = d.credential("discord", "discord_webhook").unwrap_err();
        assert!(matches!(err, NotifyError::CredentialMissing { .. }));
    }

    #[test]
    fn templated_text_detection_uses_original() {
        let original = Step::say("{Profile} done");
        let expanded = Step::say("Boss done");
        let vars = TemplateVars::default();
        let creds = Credentials::default();
        let d = Delivery {
            step: &expanded,
            original: &original,
            vars: &vars,
            credentials: &creds,
            volume: 100,
        };
        assert!(d.text_is_templated());
        assert_eq!(d.text(), "Boss done");
    }
}
