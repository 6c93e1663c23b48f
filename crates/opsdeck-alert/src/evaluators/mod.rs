pub mod backup_failure;
pub mod panel_intrusion;
pub mod resource;
pub mod service_down;
pub mod ssh_brute_force;
pub mod ssl_expiry;

use crate::snapshot::MetricSnapshot;
use crate::MetricEvaluator;
use std::sync::Arc;

/// The built-in evaluator registry, covering every metric exactly once.
pub fn builtin(snapshot: Arc<dyn MetricSnapshot>) -> Vec<Box<dyn MetricEvaluator>> {
    vec![
        Box::new(resource::ResourceEvaluator::new(snapshot.clone())),
        Box::new(service_down::ServiceDownEvaluator::new(snapshot.clone())),
        Box::new(ssl_expiry::SslExpiryEvaluator::new(snapshot.clone())),
        Box::new(backup_failure::BackupFailureEvaluator::new(snapshot.clone())),
        Box::new(ssh_brute_force::SshBruteForceEvaluator::new(snapshot.clone())),
        Box::new(panel_intrusion::PanelIntrusionEvaluator::new(snapshot)),
    ]
}
