use crate::snapshot::MetricSnapshot;
use crate::MetricEvaluator;
use anyhow::Result;
use opsdeck_common::types::{AlertRule, EvaluationResult, Metric};
use std::sync::Arc;

/// Fires when the service named in the rule's config is inactive.
///
/// The reading is binary: 1.0 for active, 0.0 for down. A rule without
/// a `service_name` is a configuration mistake and is reported in the
/// result message, never as an error.
pub struct ServiceDownEvaluator {
    snapshot: Arc<dyn MetricSnapshot>,
}

const METRICS: [Metric; 1] = [Metric::ServiceDown];

impl ServiceDownEvaluator {
    pub fn new(snapshot: Arc<dyn MetricSnapshot>) -> Self {
        Self { snapshot }
    }
}

impl MetricEvaluator for ServiceDownEvaluator {
    fn name(&self) -> &str {
        "service_down"
    }

    fn supported_metrics(&self) -> &[Metric] {
        &METRICS
    }

    fn evaluate(&self, rule: &AlertRule) -> Result<EvaluationResult> {
        let Some(service) = rule.config_str("service_name") else {
            return Ok(EvaluationResult::skipped(
                "service_down rule has no service_name configured",
            ));
        };

        match self.snapshot.service_active(service) {
            Ok(Some(true)) => Ok(EvaluationResult::not_triggered(Some(1.0))),
            Ok(Some(false)) => Ok(EvaluationResult::triggered(
                0.0,
                format!("Service {service} is down"),
            )),
            Ok(None) => Ok(EvaluationResult::not_triggered(None)),
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "Service status check failed");
                Ok(EvaluationResult::not_triggered(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{make_rule, StubSnapshot};
    use opsdeck_common::types::Condition;

    fn service_rule(name: Option<&str>) -> AlertRule {
        let mut rule = make_rule(Metric::ServiceDown, Condition::Below, 1.0);
        if let Some(name) = name {
            rule.config
                .insert("service_name".to_string(), serde_json::json!(name));
        }
        rule
    }

    #[test]
    fn inactive_service_fires_with_name_in_message() {
        let snapshot = Arc::new(StubSnapshot::default());
        snapshot.set_service_active("nginx", false);
        let evaluator = ServiceDownEvaluator::new(snapshot);

        let result = evaluator.evaluate(&service_rule(Some("nginx"))).unwrap();
        assert!(result.triggered);
        assert_eq!(result.current_value, Some(0.0));
        let message = result.message.unwrap();
        assert!(message.contains("nginx"));
        assert!(message.contains("is down"));
    }

    #[test]
    fn active_service_reads_one() {
        let snapshot = Arc::new(StubSnapshot::default());
        snapshot.set_service_active("nginx", true);
        let evaluator = ServiceDownEvaluator::new(snapshot);

        let result = evaluator.evaluate(&service_rule(Some("nginx"))).unwrap();
        assert!(!result.triggered);
        assert_eq!(result.current_value, Some(1.0));
    }

    #[test]
    fn missing_service_name_is_explained_not_raised() {
        let snapshot = Arc::new(StubSnapshot::default());
        let evaluator = ServiceDownEvaluator::new(snapshot);

        let result = evaluator.evaluate(&service_rule(None)).unwrap();
        assert!(!result.triggered);
        assert!(result.message.unwrap().contains("service_name"));
    }
}
