use crate::{MetricEvaluator, RuleCache, RuleStore};
use anyhow::{anyhow, bail, Result};
use chrono::{Duration, Utc};
use opsdeck_common::types::{
    AlertHistory, AlertRule, EvaluationResult, HistoryStatus, Metric,
};
use opsdeck_notify::dispatcher::NotificationDispatcher;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Upper bound on any single rule-store round trip.
const STORE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// One full evaluation pass over the active rules.
///
/// The sole entry point is [`evaluate`](Self::evaluate), invoked by an
/// external periodic scheduler. Rules are evaluated sequentially so
/// the cooldown gate and history writes stay race-free; a pass-level
/// lock keeps back-to-back invocations from overlapping.
pub struct AlertEvaluator {
    store: Arc<dyn RuleStore>,
    cache: Arc<dyn RuleCache>,
    evaluators: Arc<Vec<Box<dyn MetricEvaluator>>>,
    dispatcher: NotificationDispatcher,
    pass_lock: Mutex<()>,
}

impl AlertEvaluator {
    pub fn new(
        store: Arc<dyn RuleStore>,
        cache: Arc<dyn RuleCache>,
        evaluators: Vec<Box<dyn MetricEvaluator>>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            cache,
            evaluators: Arc::new(evaluators),
            dispatcher,
            pass_lock: Mutex::new(()),
        }
    }

    /// Checks that every metric is claimed by exactly one registered
    /// evaluator. An unclaimed or doubly claimed metric is a wiring
    /// bug; call this once at startup and refuse to run on failure.
    pub fn verify_coverage(&self) -> Result<()> {
        for metric in Metric::ALL {
            let owners: Vec<&str> = self
                .evaluators
                .iter()
                .filter(|e| e.supported_metrics().contains(&metric))
                .map(|e| e.name())
                .collect();
            match owners.len() {
                1 => {}
                0 => bail!("metric {metric} is not claimed by any evaluator"),
                _ => bail!("metric {metric} is claimed by more than one evaluator: {owners:?}"),
            }
        }
        Ok(())
    }

    /// Runs one pass: load rules (with cache fallback), evaluate each,
    /// gate on cooldown, notify, record history. Side effects only;
    /// every failure mode degrades to "fewer alerts fired".
    pub async fn evaluate(&self) {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            tracing::warn!("Previous evaluation pass still running, skipping this tick");
            return;
        };

        let rules = self.load_rules().await;
        tracing::debug!(rule_count = rules.len(), "Starting evaluation pass");

        for rule in &rules {
            let Some(idx) = self
                .evaluators
                .iter()
                .position(|e| e.supported_metrics().contains(&rule.metric))
            else {
                tracing::warn!(
                    rule_id = %rule.id,
                    metric = %rule.metric,
                    "No evaluator claims this metric, skipping rule"
                );
                continue;
            };

            // Sampling shells out and reads files; run it off the
            // runtime thread so a slow probe cannot stall other tasks.
            let evaluators = Arc::clone(&self.evaluators);
            let probe_rule = rule.clone();
            let outcome =
                tokio::task::spawn_blocking(move || evaluators[idx].evaluate(&probe_rule)).await;

            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    tracing::error!(
                        rule_id = %rule.id,
                        evaluator = self.evaluators[idx].name(),
                        error = %e,
                        "Evaluator failed, treating rule as not triggered"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        rule_id = %rule.id,
                        evaluator = self.evaluators[idx].name(),
                        error = %e,
                        "Evaluator panicked, treating rule as not triggered"
                    );
                    continue;
                }
            };

            if !result.triggered {
                continue;
            }

            let now = Utc::now();
            if let Some(last) = rule.last_triggered_at {
                let cooldown = Duration::minutes(i64::from(rule.cooldown_minutes));
                if now < last + cooldown {
                    tracing::debug!(
                        rule_id = %rule.id,
                        "Trigger suppressed (cooldown active)"
                    );
                    continue;
                }
            }

            self.trigger(rule, &result).await;
        }
    }

    /// Loads active rules from the store, refreshing the cache on
    /// success; degrades to the cached snapshot when the store is
    /// unreachable.
    async fn load_rules(&self) -> Vec<AlertRule> {
        let loaded = match tokio::time::timeout(STORE_TIMEOUT, self.store.load_active_rules()).await
        {
            Ok(result) => result,
            Err(_) => Err(anyhow!("rule store query timed out")),
        };

        match loaded {
            Ok(rules) => {
                // The cache write completes before evaluation starts so
                // it always reflects the last successful store read.
                match serde_json::to_vec(&rules) {
                    Ok(bytes) => {
                        if let Err(e) = self.cache.put(&bytes) {
                            tracing::warn!(error = %e, "Failed to refresh rule cache");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to serialize rule snapshot"),
                }
                rules
            }
            Err(e) => {
                tracing::error!(error = %e, "Rule store unavailable, trying cached snapshot");
                match self.cache.get() {
                    Ok(Some(bytes)) => match serde_json::from_slice::<Vec<AlertRule>>(&bytes) {
                        Ok(rules) => {
                            tracing::info!(
                                rule_count = rules.len(),
                                "Evaluating from cached rule snapshot"
                            );
                            rules
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Cached rule snapshot is corrupt");
                            Vec::new()
                        }
                    },
                    Ok(None) => {
                        tracing::error!(
                            "Rule store unavailable and no cached rule snapshot exists; \
                             evaluating zero rules this pass"
                        );
                        Vec::new()
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rule cache read failed");
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Fires one trigger: notify every configured channel
    /// independently, write one history row, bump the rule timestamp.
    async fn trigger(&self, rule: &AlertRule, result: &EvaluationResult) {
        let now = Utc::now();
        let value = result.current_value.unwrap_or_default();
        let message = result
            .message
            .clone()
            .unwrap_or_else(|| fallback_message(rule, value));

        // A channel the rule names but nobody configured is not a
        // delivery; only real sends count toward notification_sent.
        let configured = self.dispatcher.configured_channels();
        let mut any_sent = false;
        let mut attempted = Vec::with_capacity(rule.notification_channels.len());
        for channel in &rule.notification_channels {
            attempted.push(channel.to_string());
            if !configured.contains(channel) {
                tracing::warn!(
                    rule_id = %rule.id,
                    channel = %channel,
                    "Rule names a channel with no configuration section"
                );
                continue;
            }
            match self.dispatcher.send(*channel, rule, value, &message).await {
                Ok(()) => any_sent = true,
                Err(e) => {
                    tracing::warn!(
                        rule_id = %rule.id,
                        channel = %channel,
                        error = %e,
                        "Notification channel failed"
                    );
                }
            }
        }

        let entry = AlertHistory {
            id: opsdeck_common::id::next_id(),
            alert_rule_id: rule.id.clone(),
            current_value: value,
            notification_sent: any_sent,
            notification_channel: attempted.join(","),
            message: message.clone(),
            severity: rule.severity,
            category: rule.category,
            status: HistoryStatus::Triggered,
            triggered_at: now,
            resolved_at: None,
        };

        // A missed write must never prevent the next pass from running.
        match tokio::time::timeout(STORE_TIMEOUT, self.store.insert_history(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(rule_id = %rule.id, error = %e, "History write failed"),
            Err(_) => tracing::warn!(rule_id = %rule.id, "History write timed out"),
        }
        match tokio::time::timeout(STORE_TIMEOUT, self.store.touch_last_triggered(&rule.id, now))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(rule_id = %rule.id, error = %e, "last_triggered_at update failed")
            }
            Err(_) => tracing::warn!(rule_id = %rule.id, "last_triggered_at update timed out"),
        }

        tracing::info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            metric = %rule.metric,
            value,
            notification_sent = any_sent,
            "Alert triggered"
        );
    }
}

/// Canonical message used when the evaluator did not render one.
pub fn fallback_message(rule: &AlertRule, value: f64) -> String {
    format!(
        "[{}] {} - {} is {} {} (threshold: {} {})",
        rule.severity.to_string().to_uppercase(),
        rule.name,
        rule.metric,
        rule.condition,
        value,
        rule.condition,
        rule.threshold,
    )
}
