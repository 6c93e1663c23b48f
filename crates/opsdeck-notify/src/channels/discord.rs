use crate::channels::{http_client, post_json};
use crate::config::DiscordConfig;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use opsdeck_common::types::{AlertRule, Channel};

pub struct DiscordChannel {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordChannel {
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            webhook_url: config.webhook_url.clone(),
        })
    }
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn channel(&self) -> Channel {
        Channel::Discord
    }

    async fn send(&self, _rule: &AlertRule, _value: f64, message: &str) -> Result<()> {
        let body = serde_json::json!({ "content": message });
        post_json(&self.client, &self.webhook_url, &body).await
    }
}
