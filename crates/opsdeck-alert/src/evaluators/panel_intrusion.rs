use crate::snapshot::MetricSnapshot;
use crate::MetricEvaluator;
use anyhow::Result;
use chrono::Duration;
use opsdeck_common::types::{AlertRule, EvaluationResult, Metric};
use std::sync::Arc;

/// Window (minutes) over the panel's login audit log.
pub const PANEL_WINDOW_MINUTES: i64 = 15;

/// Detects repeated failed logins against the panel itself, measured
/// as the peak failure count from a single IP in the last 15 minutes.
pub struct PanelIntrusionEvaluator {
    snapshot: Arc<dyn MetricSnapshot>,
}

const METRICS: [Metric; 1] = [Metric::PanelIntrusion];

impl PanelIntrusionEvaluator {
    pub fn new(snapshot: Arc<dyn MetricSnapshot>) -> Self {
        Self { snapshot }
    }
}

impl MetricEvaluator for PanelIntrusionEvaluator {
    fn name(&self) -> &str {
        "panel_intrusion"
    }

    fn supported_metrics(&self) -> &[Metric] {
        &METRICS
    }

    fn evaluate(&self, rule: &AlertRule) -> Result<EvaluationResult> {
        let value = match self
            .snapshot
            .max_failed_panel_logins(Duration::minutes(PANEL_WINDOW_MINUTES))
        {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(EvaluationResult::not_triggered(None)),
            Err(e) => {
                tracing::warn!(error = %e, "Panel audit log scan failed");
                return Ok(EvaluationResult::not_triggered(None));
            }
        };

        if rule.condition.holds(value, rule.threshold) {
            Ok(EvaluationResult::triggered(
                value,
                format!(
                    "Possible panel intrusion: {value:.0} failed login(s) from a single IP in 15 minutes"
                ),
            ))
        } else {
            Ok(EvaluationResult::not_triggered(Some(value)))
        }
    }
}
