use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;

use super::driver::{check_response, ChannelDriver, Delivery};
use crate::error::{NotifyError, Result};

/// Generic HTTP webhook. Method defaults to POST; the body is the expanded
/// `body` template, or a small JSON document when none is configured.
pub struct WebhookDriver {
    http: reqwest::Client,
}

impl WebhookDriver {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Default JSON payload.
pub fn default_body(delivery: &Delivery<'_>) -> serde_json::Value {
    let step = delivery.step;
    serde_json::json!({
        "profile": delivery.vars.profile,
        "text": step.text.as_deref().unwrap_or(""),
        "message": step.message.as_deref().unwrap_or(""),
        "hostname": delivery.vars.hostname,
        "time": delivery.vars.time,
    })
}

fn looks_like_json(body: &str) -> bool {
    let trimmed = body.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

#[async_trait]
impl ChannelDriver for WebhookDriver {
    async fn send(&self, delivery: &Delivery<'_>) -> Result<()> {
        let step = delivery.step;
        let url = step
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| NotifyError::driver("webhook", "step has no 'url'"))?;

        let method_name = step.method.as_deref().unwrap_or("POST").to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| NotifyError::driver("webhook", format!("invalid method '{method_name}'")))?;

        let mut request = self.http.request(method.clone(), url);
        let mut has_content_type = false;
        if let Some(headers) = &step.headers {
            for (name, value) in headers {
                has_content_type |= name.eq_ignore_ascii_case("content-type");
                request = request.header(name.as_str(), value.as_str());
            }
        }

        match step.body.as_deref() {
            Some(body) => {
                if !has_content_type {
                    let ct = if looks_like_json(body) {
                        "application/json"
                    } else {
                        "text/plain; charset=utf-8"
                    };
                    request = request.header(CONTENT_TYPE, ct);
                }
                request = request.body(body.to_string());
            }
            None if method != Method::GET && method != Method::HEAD => {
                request = request.json(&default_body(delivery));
            }
            None => {}
        }

        let resp = request.send().await?;
        check_response("webhook", resp).await?;
        Ok(())
    }
}
