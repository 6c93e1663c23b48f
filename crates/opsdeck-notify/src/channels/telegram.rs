use crate::channels::{http_client, post_json};
use crate::config::TelegramConfig;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use opsdeck_common::types::{AlertRule, Channel};

pub struct TelegramChannel {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token)
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn send(&self, _rule: &AlertRule, _value: f64, message: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": message,
        });
        post_json(&self.client, &self.endpoint(), &body).await
    }
}
