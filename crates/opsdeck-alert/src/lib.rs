//! Alert rule evaluation engine for the opsdeck control panel.
//!
//! A periodic pass ([`evaluator::AlertEvaluator::evaluate`]) loads the
//! active rules, dispatches each to the one [`MetricEvaluator`] that
//! claims its metric, deduplicates triggers with per-rule cooldowns,
//! records history, and fans out notifications. The rule store may go
//! away at any time; the engine then degrades to the last known-good
//! snapshot held in the [`RuleCache`].

pub mod evaluator;
pub mod evaluators;
pub mod snapshot;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsdeck_common::types::{AlertHistory, AlertRule, EvaluationResult, Metric};

/// One evaluation strategy per metric family.
///
/// Implementations are registered in a plain list at startup; the
/// orchestrator resolves a rule's owner by scanning
/// [`supported_metrics`](MetricEvaluator::supported_metrics). Metric
/// ownership must be mutually exclusive
/// (see [`evaluator::AlertEvaluator::verify_coverage`]).
pub trait MetricEvaluator: Send + Sync {
    /// Evaluator name, used in logs and coverage diagnostics.
    fn name(&self) -> &str;

    /// Metrics this evaluator claims.
    fn supported_metrics(&self) -> &[Metric];

    /// Tests the rule against current readings. Must be pure with
    /// respect to the rule. A missing reading is not an error: it maps
    /// to `triggered=false, current_value=None`. An `Err` is reserved
    /// for programmer errors and is isolated per rule by the caller.
    /// May block on process or file I/O; the orchestrator runs it on a
    /// blocking thread.
    fn evaluate(&self, rule: &AlertRule) -> Result<EvaluationResult>;
}

/// Durable store of alert rules and trigger history.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules with `is_active = true`, in no particular order.
    async fn load_active_rules(&self) -> Result<Vec<AlertRule>>;

    /// Upserts the rule's `last_triggered_at` timestamp.
    async fn touch_last_triggered(&self, rule_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Inserts one trigger record.
    async fn insert_history(&self, entry: &AlertHistory) -> Result<()>;
}

/// Last-known-good snapshot of the active rule set, consulted only
/// when the rule store is unreachable.
///
/// A single opaque blob under a fixed key; `put` always overwrites.
pub trait RuleCache: Send + Sync {
    fn get(&self) -> Result<Option<Vec<u8>>>;
    fn put(&self, snapshot: &[u8]) -> Result<()>;
}
