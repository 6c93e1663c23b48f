use crate::channels::discord::DiscordChannel;
use crate::channels::email::EmailChannel;
use crate::channels::slack::SlackChannel;
use crate::channels::telegram::TelegramChannel;
use crate::config::NotificationConfig;
use crate::NotificationChannel;
use anyhow::Result;
use chrono::Utc;
use opsdeck_common::types::{AlertRule, Category, Channel, Condition, Metric, Severity};
use std::collections::BTreeSet;

/// Routes a rendered alert message to one channel at a time.
///
/// Holds only the channels that were actually configured; sending to an
/// unconfigured channel is a silent no-op, not a failure.
pub struct NotificationDispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Builds every channel with a configuration section present.
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
        if let Some(email) = &config.email {
            channels.push(Box::new(EmailChannel::new(email)?));
        }
        if let Some(telegram) = &config.telegram {
            channels.push(Box::new(TelegramChannel::new(telegram)?));
        }
        if let Some(slack) = &config.slack {
            channels.push(Box::new(SlackChannel::new(slack)?));
        }
        if let Some(discord) = &config.discord {
            channels.push(Box::new(DiscordChannel::new(discord)?));
        }
        Ok(Self::new(channels))
    }

    pub fn configured_channels(&self) -> Vec<Channel> {
        self.channels.iter().map(|c| c.channel()).collect()
    }

    /// Sends `message` through a single channel.
    ///
    /// # Errors
    ///
    /// Propagates the channel's delivery error; the caller decides how
    /// to isolate it. An unconfigured channel returns `Ok(())`.
    pub async fn send(
        &self,
        channel: Channel,
        rule: &AlertRule,
        value: f64,
        message: &str,
    ) -> Result<()> {
        let Some(target) = self.channels.iter().find(|c| c.channel() == channel) else {
            tracing::debug!(channel = %channel, "Channel not configured, skipping");
            return Ok(());
        };
        target.send(rule, value, message).await
    }

    /// Sends a synthetic test alert through one channel, bypassing
    /// cooldown and history entirely. Used for configuration checks.
    pub async fn send_test(&self, channel: Channel) -> Result<()> {
        let rule = test_rule(channel);
        self.send(
            channel,
            &rule,
            0.0,
            "This is a test notification from opsdeck. If you can read this, the channel is configured correctly.",
        )
        .await
    }
}

fn test_rule(channel: Channel) -> AlertRule {
    let now = Utc::now();
    let mut channels = BTreeSet::new();
    channels.insert(channel);
    AlertRule {
        id: opsdeck_common::id::next_id(),
        name: "opsdeck test alert".to_string(),
        category: Category::Resource,
        severity: Severity::Info,
        metric: Metric::Cpu,
        condition: Condition::Above,
        threshold: 0.0,
        duration_seconds: 0,
        notification_channels: channels,
        config: serde_json::Map::new(),
        is_active: true,
        cooldown_minutes: 1,
        last_triggered_at: None,
        created_at: now,
        updated_at: now,
    }
}
