use crate::channels::{http_client, post_json};
use crate::config::SlackConfig;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use opsdeck_common::types::{AlertRule, Channel};

pub struct SlackChannel {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackChannel {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            webhook_url: config.webhook_url.clone(),
        })
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn channel(&self) -> Channel {
        Channel::Slack
    }

    async fn send(&self, _rule: &AlertRule, _value: f64, message: &str) -> Result<()> {
        let body = serde_json::json!({ "text": message });
        post_json(&self.client, &self.webhook_url, &body).await
    }
}
