use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use opsdeck_common::types::Metric;

/// Current readings per metric family, supplied by the host.
///
/// The sampling mechanics (procfs, `systemctl`, log files) live behind
/// this trait; evaluators only consume the readings. Every method
/// returns `Ok(None)` when the family cannot produce a value right now
/// (no certificates installed, log file absent, subsystem missing);
/// that is normal operation, not an error. Implementations must bound
/// their own I/O with short timeouts.
pub trait MetricSnapshot: Send + Sync {
    /// Percentage reading for `cpu`/`memory`/`disk`, throughput for
    /// `network`.
    fn resource_value(&self, metric: Metric) -> Result<Option<f64>>;

    /// Whether the named system service is currently active.
    fn service_active(&self, service: &str) -> Result<Option<bool>>;

    /// Minimum days-to-expiry across all installed certificates.
    fn min_cert_expiry_days(&self) -> Result<Option<f64>>;

    /// Number of failed backup jobs finished at or after `since`.
    fn failed_backup_count(&self, since: DateTime<Utc>) -> Result<Option<f64>>;

    /// Count of currently banned sources, when a ban-tracking
    /// subsystem (e.g. fail2ban) is present. `None` when it is not.
    fn banned_source_count(&self) -> Result<Option<f64>>;

    /// Maximum failed SSH login count from a single source within
    /// `window`, from the system auth log.
    fn max_failed_ssh_logins(&self, window: Duration) -> Result<Option<f64>>;

    /// Maximum failed panel login count from a single IP within
    /// `window`, from the panel's login audit log.
    fn max_failed_panel_logins(&self, window: Duration) -> Result<Option<f64>>;
}
