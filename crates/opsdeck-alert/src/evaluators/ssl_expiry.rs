use crate::snapshot::MetricSnapshot;
use crate::MetricEvaluator;
use anyhow::Result;
use opsdeck_common::types::{AlertRule, EvaluationResult, Metric};
use std::sync::Arc;

/// Fires when the soonest-expiring certificate is at or under the
/// configured number of days.
///
/// `days_before` in the rule config overrides the threshold as the
/// comparison bound. No installed certificates means nothing to check.
pub struct SslExpiryEvaluator {
    snapshot: Arc<dyn MetricSnapshot>,
}

const METRICS: [Metric; 1] = [Metric::SslExpiry];

impl SslExpiryEvaluator {
    pub fn new(snapshot: Arc<dyn MetricSnapshot>) -> Self {
        Self { snapshot }
    }
}

impl MetricEvaluator for SslExpiryEvaluator {
    fn name(&self) -> &str {
        "ssl_expiry"
    }

    fn supported_metrics(&self) -> &[Metric] {
        &METRICS
    }

    fn evaluate(&self, rule: &AlertRule) -> Result<EvaluationResult> {
        let bound = rule.config_f64("days_before").unwrap_or(rule.threshold);

        let days = match self.snapshot.min_cert_expiry_days() {
            Ok(Some(days)) => days,
            Ok(None) => return Ok(EvaluationResult::not_triggered(None)),
            Err(e) => {
                tracing::warn!(error = %e, "Certificate expiry scan failed");
                return Ok(EvaluationResult::not_triggered(None));
            }
        };

        if days <= bound {
            Ok(EvaluationResult::triggered(
                days,
                format!("SSL certificate expires in {days:.0} days (threshold: {bound:.0} days)"),
            ))
        } else {
            Ok(EvaluationResult::not_triggered(Some(days)))
        }
    }
}
