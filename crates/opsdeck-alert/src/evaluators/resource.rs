use crate::snapshot::MetricSnapshot;
use crate::MetricEvaluator;
use anyhow::Result;
use opsdeck_common::types::{AlertRule, EvaluationResult, Metric};
use std::sync::Arc;

/// Threshold checks on host resource readings.
///
/// Claims `network` alongside the percentage metrics so that every
/// metric has exactly one owner.
pub struct ResourceEvaluator {
    snapshot: Arc<dyn MetricSnapshot>,
}

const METRICS: [Metric; 4] = [Metric::Cpu, Metric::Memory, Metric::Disk, Metric::Network];

impl ResourceEvaluator {
    pub fn new(snapshot: Arc<dyn MetricSnapshot>) -> Self {
        Self { snapshot }
    }
}

impl MetricEvaluator for ResourceEvaluator {
    fn name(&self) -> &str {
        "resource"
    }

    fn supported_metrics(&self) -> &[Metric] {
        &METRICS
    }

    fn evaluate(&self, rule: &AlertRule) -> Result<EvaluationResult> {
        let value = match self.snapshot.resource_value(rule.metric) {
            Ok(Some(v)) => v,
            Ok(None) => return Ok(EvaluationResult::not_triggered(None)),
            Err(e) => {
                tracing::warn!(metric = %rule.metric, error = %e, "Resource reading failed");
                return Ok(EvaluationResult::not_triggered(None));
            }
        };

        if rule.condition.holds(value, rule.threshold) {
            // Message rendering is left to the orchestrator's canonical
            // fallback format.
            Ok(EvaluationResult::triggered_unrendered(value))
        } else {
            Ok(EvaluationResult::not_triggered(Some(value)))
        }
    }
}
