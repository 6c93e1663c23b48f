use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use opsdeck_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Rule category, denormalized onto history rows so a trigger record
/// survives deletion of its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Resource,
    Service,
    Security,
    Backup,
    Ssl,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Resource => write!(f, "resource"),
            Category::Service => write!(f, "service"),
            Category::Security => write!(f, "security"),
            Category::Backup => write!(f, "backup"),
            Category::Ssl => write!(f, "ssl"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "resource" => Ok(Category::Resource),
            "service" => Ok(Category::Service),
            "security" => Ok(Category::Security),
            "backup" => Ok(Category::Backup),
            "ssl" => Ok(Category::Ssl),
            _ => Err(format!("unknown category: {s}")),
        }
    }
}

/// Named category of measurable condition a rule applies to.
///
/// Each metric is claimed by exactly one registered evaluator; an
/// unclaimed (or doubly claimed) metric is a configuration bug caught
/// at startup, not a runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
    Network,
    ServiceDown,
    SslExpiry,
    BackupFailed,
    SshBruteForce,
    PanelIntrusion,
}

impl Metric {
    /// All metric values, used for evaluator coverage checks.
    pub const ALL: [Metric; 9] = [
        Metric::Cpu,
        Metric::Memory,
        Metric::Disk,
        Metric::Network,
        Metric::ServiceDown,
        Metric::SslExpiry,
        Metric::BackupFailed,
        Metric::SshBruteForce,
        Metric::PanelIntrusion,
    ];
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Disk => "disk",
            Metric::Network => "network",
            Metric::ServiceDown => "service_down",
            Metric::SslExpiry => "ssl_expiry",
            Metric::BackupFailed => "backup_failed",
            Metric::SshBruteForce => "ssh_brute_force",
            Metric::PanelIntrusion => "panel_intrusion",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Metric::Cpu),
            "memory" => Ok(Metric::Memory),
            "disk" => Ok(Metric::Disk),
            "network" => Ok(Metric::Network),
            "service_down" => Ok(Metric::ServiceDown),
            "ssl_expiry" => Ok(Metric::SslExpiry),
            "backup_failed" => Ok(Metric::BackupFailed),
            "ssh_brute_force" => Ok(Metric::SshBruteForce),
            "panel_intrusion" => Ok(Metric::PanelIntrusion),
            _ => Err(format!("unknown metric: {s}")),
        }
    }
}

/// Tolerance for `equals` comparisons. Fractional percentage readings
/// never compare bit-exactly, so equality is banded.
pub const EQUALS_EPSILON: f64 = 0.01;

/// Three-way threshold comparison shared by every evaluator.
///
/// # Examples
///
/// ```
/// use opsdeck_common::types::Condition;
///
/// assert!(Condition::Above.holds(90.1, 90.0));
/// assert!(!Condition::Above.holds(90.0, 90.0));
/// assert!(Condition::Equals.holds(50.0099, 50.0));
/// assert!(!Condition::Equals.holds(50.01, 50.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Above,
    Below,
    Equals,
}

impl Condition {
    pub fn holds(&self, measured: f64, threshold: f64) -> bool {
        match self {
            Condition::Above => measured > threshold,
            Condition::Below => measured < threshold,
            Condition::Equals => (measured - threshold).abs() < EQUALS_EPSILON,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Above => write!(f, "above"),
            Condition::Below => write!(f, "below"),
            Condition::Equals => write!(f, "equals"),
        }
    }
}

impl std::str::FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "above" => Ok(Condition::Above),
            "below" => Ok(Condition::Below),
            "equals" => Ok(Condition::Equals),
            _ => Err(format!("unknown condition: {s}")),
        }
    }
}

/// Outbound notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Telegram,
    Slack,
    Discord,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Telegram => write!(f, "telegram"),
            Channel::Slack => write!(f, "slack"),
            Channel::Discord => write!(f, "discord"),
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "telegram" => Ok(Channel::Telegram),
            "slack" => Ok(Channel::Slack),
            "discord" => Ok(Channel::Discord),
            _ => Err(format!("unknown channel: {s}")),
        }
    }
}

/// A user-authored alert policy.
///
/// Created and edited through the panel's CRUD layer; the evaluation
/// engine only ever mutates `last_triggered_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub severity: Severity,
    pub metric: Metric,
    pub condition: Condition,
    /// Comparison bound, >= 0.
    pub threshold: f64,
    /// Reserved for sustained-condition checks (0-3600).
    pub duration_seconds: u32,
    /// Order-insensitive channel set.
    pub notification_channels: BTreeSet<Channel>,
    /// Metric-specific settings, e.g. `service_name` for `service_down`
    /// or `days_before` for `ssl_expiry`.
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    pub is_active: bool,
    /// Minimum minutes between two triggers of this rule (1-1440).
    pub cooldown_minutes: u32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    /// String config value, if present and a string.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    /// Numeric config value, if present and numeric.
    pub fn config_f64(&self, key: &str) -> Option<f64> {
        self.config.get(key).and_then(|v| v.as_f64())
    }
}

/// Dashboard-driven lifecycle of a history row. The engine only ever
/// creates rows in the `Triggered` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Triggered,
    Acknowledged,
    Resolved,
}

impl std::fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryStatus::Triggered => write!(f, "triggered"),
            HistoryStatus::Acknowledged => write!(f, "acknowledged"),
            HistoryStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for HistoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "triggered" => Ok(HistoryStatus::Triggered),
            "acknowledged" => Ok(HistoryStatus::Acknowledged),
            "resolved" => Ok(HistoryStatus::Resolved),
            _ => Err(format!("unknown history status: {s}")),
        }
    }
}

/// Immutable-after-creation record of one trigger event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistory {
    pub id: String,
    /// Weak reference; the rule may be deleted later.
    pub alert_rule_id: String,
    pub current_value: f64,
    /// True when at least one channel accepted the notification.
    pub notification_sent: bool,
    /// Comma-joined list of channels actually attempted.
    pub notification_channel: String,
    pub message: String,
    pub severity: Severity,
    pub category: Category,
    pub status: HistoryStatus,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Uniform return contract of every metric evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub triggered: bool,
    pub current_value: Option<f64>,
    pub message: Option<String>,
}

impl EvaluationResult {
    /// Condition not met, or no current reading available.
    pub fn not_triggered(current_value: Option<f64>) -> Self {
        Self {
            triggered: false,
            current_value,
            message: None,
        }
    }

    /// Not triggered, with an explanation (e.g. a missing `service_name`).
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            triggered: false,
            current_value: None,
            message: Some(message.into()),
        }
    }

    /// Condition met.
    pub fn triggered(current_value: f64, message: impl Into<String>) -> Self {
        Self {
            triggered: true,
            current_value: Some(current_value),
            message: Some(message.into()),
        }
    }

    /// Condition met, leaving message rendering to the orchestrator's
    /// canonical fallback format.
    pub fn triggered_unrendered(current_value: f64) -> Self {
        Self {
            triggered: true,
            current_value: Some(current_value),
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_round_trips_through_strings() {
        for metric in Metric::ALL {
            let parsed: Metric = metric.to_string().parse().unwrap();
            assert_eq!(parsed, metric);
        }
    }

    #[test]
    fn equals_epsilon_boundary() {
        // Exactly epsilon apart does not hold; just inside does.
        assert!(!Condition::Equals.holds(80.01, 80.0));
        assert!(Condition::Equals.holds(80.0099, 80.0));
        assert!(Condition::Equals.holds(79.9901, 80.0));
    }

    #[test]
    fn channel_set_is_order_insensitive() {
        let mut a = BTreeSet::new();
        a.insert(Channel::Slack);
        a.insert(Channel::Email);
        let mut b = BTreeSet::new();
        b.insert(Channel::Email);
        b.insert(Channel::Slack);
        assert_eq!(a, b);
    }
}
