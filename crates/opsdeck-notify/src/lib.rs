//! Notification delivery for triggered alerts.
//!
//! One [`NotificationChannel`] implementation per outbound channel
//! (email over SMTP, Telegram bot API, Slack and Discord webhooks).
//! Channels are built from an explicit [`config::NotificationConfig`]
//! and routed through the [`dispatcher::NotificationDispatcher`]; an
//! unconfigured channel is silently skipped, never an error.

pub mod channels;
pub mod config;
pub mod dispatcher;


use anyhow::Result;
use async_trait::async_trait;
use opsdeck_common::types::{AlertRule, Channel};

/// A delivery channel for rendered alert messages.
///
/// Implementations must not share mutable state; each reads only its
/// own section of the notification configuration.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// The channel this implementation serves.
    fn channel(&self) -> Channel;

    /// Delivers `message` for the given rule and measured value.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails after retries (if
    /// applicable). The caller isolates per-channel failures.
    async fn send(&self, rule: &AlertRule, value: f64, message: &str) -> Result<()>;
}
