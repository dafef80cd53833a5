use async_trait::async_trait;

use super::driver::{check_response, ChannelDriver, Delivery};
use crate::error::Result;

/// Text message through a Slack incoming webhook.
pub struct SlackDriver {
    http: reqwest::Client,
}

impl SlackDriver {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChannelDriver for SlackDriver {
    async fn send(&self, delivery: &Delivery<'_>) -> Result<()> {
        let url = delivery.credential("slack", "slack_webhook")?;
        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({ "text": delivery.text() }))
            .send()
            .await?;
        check_response("slack", resp).await?;
        Ok(())
    }
}
