use crate::snapshot::MetricSnapshot;
use crate::MetricEvaluator;
use anyhow::Result;
use chrono::Duration;
use opsdeck_common::types::{AlertRule, EvaluationResult, Metric};
use std::sync::Arc;

/// Auth-log window (minutes) consulted when no ban-tracking subsystem
/// is present.
pub const SSH_WINDOW_MINUTES: i64 = 10;

/// Detects SSH brute-force activity.
///
/// Prefers the banned-source count when a ban-tracking subsystem is
/// available; otherwise falls back to the peak failed-login count from
/// a single source in the last 10 minutes of the auth log.
pub struct SshBruteForceEvaluator {
    snapshot: Arc<dyn MetricSnapshot>,
}

const METRICS: [Metric; 1] = [Metric::SshBruteForce];

impl SshBruteForceEvaluator {
    pub fn new(snapshot: Arc<dyn MetricSnapshot>) -> Self {
        Self { snapshot }
    }
}

impl MetricEvaluator for SshBruteForceEvaluator {
    fn name(&self) -> &str {
        "ssh_brute_force"
    }

    fn supported_metrics(&self) -> &[Metric] {
        &METRICS
    }

    fn evaluate(&self, rule: &AlertRule) -> Result<EvaluationResult> {
        let (value, source) = match self.snapshot.banned_source_count() {
            Ok(Some(banned)) => (Some(banned), "banned source(s)"),
            Ok(None) => match self
                .snapshot
                .max_failed_ssh_logins(Duration::minutes(SSH_WINDOW_MINUTES))
            {
                Ok(value) => (value, "failed SSH login(s) from a single source in 10 minutes"),
                Err(e) => {
                    tracing::warn!(error = %e, "Auth log scan failed");
                    (None, "")
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Ban subsystem query failed");
                (None, "")
            }
        };

        let Some(value) = value else {
            return Ok(EvaluationResult::not_triggered(None));
        };

        if rule.condition.holds(value, rule.threshold) {
            Ok(EvaluationResult::triggered(
                value,
                format!("SSH brute-force suspected: {value:.0} {source}"),
            ))
        } else {
            Ok(EvaluationResult::not_triggered(Some(value)))
        }
    }
}
