//! Local host readings behind the `MetricSnapshot` port.
//!
//! [`SystemSnapshot`] samples the machine opsdeck itself runs on:
//! resource usage through `sysinfo`, service state through `systemctl`,
//! certificate expiry from PEM files on disk, and login failures from
//! the system auth log and the panel's own audit log. Each sampling
//! concern lives in its own module; this crate only ever reads, it
//! never writes host state.

pub mod auth_log;
pub mod backups;
pub mod certs;
pub mod fail2ban;
pub mod resources;
pub mod services;


use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use opsdeck_alert::snapshot::MetricSnapshot;
use opsdeck_common::types::Metric;
use resources::ResourceSampler;
use serde::Deserialize;
use std::path::PathBuf;

/// Where on the host each metric family is read from.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// System auth log in syslog format. `None` disables SSH failure
    /// counting from the log.
    #[serde(default = "default_auth_log")]
    pub auth_log: Option<PathBuf>,
    /// Panel login audit log, one JSON object per line.
    #[serde(default)]
    pub panel_audit_log: Option<PathBuf>,
    /// Directory of per-job backup status files.
    #[serde(default)]
    pub backup_state_dir: Option<PathBuf>,
    /// Directories scanned for PEM certificates.
    #[serde(default = "default_cert_dirs")]
    pub cert_dirs: Vec<PathBuf>,
    /// Consult fail2ban for the banned-source count before falling back
    /// to auth log parsing.
    #[serde(default = "default_use_fail2ban")]
    pub use_fail2ban: bool,
    /// Timeout for external probe commands (`systemctl`, fail2ban).
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_auth_log() -> Option<PathBuf> {
    Some(PathBuf::from("/var/log/auth.log"))
}

fn default_cert_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/etc/letsencrypt/live"),
        PathBuf::from("/etc/ssl/opsdeck"),
    ]
}

fn default_use_fail2ban() -> bool {
    true
}

fn default_probe_timeout_secs() -> u64 {
    5
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            auth_log: default_auth_log(),
            panel_audit_log: None,
            backup_state_dir: None,
            cert_dirs: default_cert_dirs(),
            use_fail2ban: default_use_fail2ban(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

/// `MetricSnapshot` over the local machine.
pub struct SystemSnapshot {
    config: SnapshotConfig,
    resources: ResourceSampler,
}

impl SystemSnapshot {
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            config,
            resources: ResourceSampler::new(),
        }
    }
}

impl MetricSnapshot for SystemSnapshot {
    fn resource_value(&self, metric: Metric) -> Result<Option<f64>> {
        self.resources.sample(metric)
    }

    fn service_active(&self, service: &str) -> Result<Option<bool>> {
        services::is_active(service, self.config.probe_timeout_secs)
    }

    fn min_cert_expiry_days(&self) -> Result<Option<f64>> {
        certs::min_expiry_days(&self.config.cert_dirs, Utc::now())
    }

    fn failed_backup_count(&self, since: DateTime<Utc>) -> Result<Option<f64>> {
        let Some(dir) = &self.config.backup_state_dir else {
            return Ok(None);
        };
        backups::failed_count(dir, since)
    }

    fn banned_source_count(&self) -> Result<Option<f64>> {
        if !self.config.use_fail2ban {
            return Ok(None);
        }
        fail2ban::banned_count("sshd", self.config.probe_timeout_secs)
    }

    fn max_failed_ssh_logins(&self, window: Duration) -> Result<Option<f64>> {
        let Some(path) = &self.config.auth_log else {
            return Ok(None);
        };
        auth_log::max_failures_per_source(path, Utc::now() - window)
    }

    fn max_failed_panel_logins(&self, window: Duration) -> Result<Option<f64>> {
        let Some(path) = &self.config.panel_audit_log else {
            return Ok(None);
        };
        auth_log::max_panel_failures_per_ip(path, Utc::now() - window)
    }
}
