use crate::snapshot::MetricSnapshot;
use crate::MetricEvaluator;
use anyhow::Result;
use chrono::{Duration, Utc};
use opsdeck_common::types::{AlertRule, EvaluationResult, Metric};
use std::sync::Arc;

/// Hours of lookback when the rule has never triggered before.
pub const BACKUP_LOOKBACK_HOURS: i64 = 24;

/// Counts failed backup jobs since the rule last triggered (or within
/// the prior 24 hours on the first evaluation) and compares the count
/// through the rule condition.
pub struct BackupFailureEvaluator {
    snapshot: Arc<dyn MetricSnapshot>,
}

const METRICS: [Metric; 1] = [Metric::BackupFailed];

impl BackupFailureEvaluator {
    pub fn new(snapshot: Arc<dyn MetricSnapshot>) -> Self {
        Self { snapshot }
    }
}

impl MetricEvaluator for BackupFailureEvaluator {
    fn name(&self) -> &str {
        "backup_failure"
    }

    fn supported_metrics(&self) -> &[Metric] {
        &METRICS
    }

    fn evaluate(&self, rule: &AlertRule) -> Result<EvaluationResult> {
        let now = Utc::now();
        let since = rule
            .last_triggered_at
            .unwrap_or(now - Duration::hours(BACKUP_LOOKBACK_HOURS));

        let count = match self.snapshot.failed_backup_count(since) {
            Ok(Some(count)) => count,
            Ok(None) => return Ok(EvaluationResult::not_triggered(None)),
            Err(e) => {
                tracing::warn!(error = %e, "Backup status scan failed");
                return Ok(EvaluationResult::not_triggered(None));
            }
        };

        if rule.condition.holds(count, rule.threshold) {
            Ok(EvaluationResult::triggered(
                count,
                format!(
                    "{count:.0} backup job(s) failed since {}",
                    since.format("%Y-%m-%d %H:%M UTC")
                ),
            ))
        } else {
            Ok(EvaluationResult::not_triggered(Some(count)))
        }
    }
}
