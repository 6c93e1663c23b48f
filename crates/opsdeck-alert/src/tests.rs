use crate::evaluator::AlertEvaluator;
use crate::evaluators;
use crate::{MetricEvaluator, RuleCache, RuleStore};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use opsdeck_common::types::{
    AlertHistory, AlertRule, Channel, Condition, EvaluationResult, Metric,
};
use opsdeck_notify::dispatcher::NotificationDispatcher;
use opsdeck_notify::NotificationChannel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) mod support {
    use super::*;
    use opsdeck_common::types::{Category, Severity};
    use std::collections::{BTreeSet, HashMap};

    pub fn make_rule(metric: Metric, condition: Condition, threshold: f64) -> AlertRule {
        let now = Utc::now();
        AlertRule {
            id: opsdeck_common::id::next_id(),
            name: format!("{metric} rule"),
            category: Category::Resource,
            severity: Severity::Warning,
            metric,
            condition,
            threshold,
            duration_seconds: 0,
            notification_channels: BTreeSet::new(),
            config: serde_json::Map::new(),
            is_active: true,
            cooldown_minutes: 10,
            last_triggered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// In-memory snapshot provider. Unset readings answer `Ok(None)`,
    /// matching a host where that subsystem is absent.
    #[derive(Default)]
    pub struct StubSnapshot {
        resources: Mutex<HashMap<Metric, f64>>,
        services: Mutex<HashMap<String, bool>>,
        min_cert_days: Mutex<Option<f64>>,
        failed_backups: Mutex<Option<f64>>,
        backup_since: Mutex<Option<DateTime<Utc>>>,
        banned_sources: Mutex<Option<f64>>,
        ssh_failures: Mutex<Option<f64>>,
        panel_failures: Mutex<Option<f64>>,
    }

    impl StubSnapshot {
        pub fn set_resource(&self, metric: Metric, value: f64) {
            self.resources.lock().unwrap().insert(metric, value);
        }

        pub fn set_service_active(&self, name: &str, active: bool) {
            self.services.lock().unwrap().insert(name.to_string(), active);
        }

        pub fn set_min_cert_days(&self, days: f64) {
            *self.min_cert_days.lock().unwrap() = Some(days);
        }

        pub fn set_failed_backups(&self, count: f64) {
            *self.failed_backups.lock().unwrap() = Some(count);
        }

        /// The `since` bound the backup evaluator last asked for.
        pub fn last_backup_since(&self) -> Option<DateTime<Utc>> {
            *self.backup_since.lock().unwrap()
        }

        pub fn set_banned_sources(&self, count: f64) {
            *self.banned_sources.lock().unwrap() = Some(count);
        }

        pub fn set_ssh_failures(&self, count: f64) {
            *self.ssh_failures.lock().unwrap() = Some(count);
        }

        pub fn set_panel_failures(&self, count: f64) {
            *self.panel_failures.lock().unwrap() = Some(count);
        }
    }

    impl crate::snapshot::MetricSnapshot for StubSnapshot {
        fn resource_value(&self, metric: Metric) -> Result<Option<f64>> {
            Ok(self.resources.lock().unwrap().get(&metric).copied())
        }

        fn service_active(&self, service: &str) -> Result<Option<bool>> {
            Ok(self.services.lock().unwrap().get(service).copied())
        }

        fn min_cert_expiry_days(&self) -> Result<Option<f64>> {
            Ok(*self.min_cert_days.lock().unwrap())
        }

        fn failed_backup_count(&self, since: DateTime<Utc>) -> Result<Option<f64>> {
            *self.backup_since.lock().unwrap() = Some(since);
            Ok(*self.failed_backups.lock().unwrap())
        }

        fn banned_source_count(&self) -> Result<Option<f64>> {
            Ok(*self.banned_sources.lock().unwrap())
        }

        fn max_failed_ssh_logins(&self, _window: Duration) -> Result<Option<f64>> {
            Ok(*self.ssh_failures.lock().unwrap())
        }

        fn max_failed_panel_logins(&self, _window: Duration) -> Result<Option<f64>> {
            Ok(*self.panel_failures.lock().unwrap())
        }
    }
}

use support::{make_rule, StubSnapshot};

/// Store whose failure mode can be flipped mid-test. `touch_last_triggered`
/// writes back into the held rules so repeated passes see the cooldown.
#[derive(Default)]
struct MockStore {
    rules: Mutex<Vec<AlertRule>>,
    fail: AtomicBool,
    history: Mutex<Vec<AlertHistory>>,
}

impl MockStore {
    fn with_rules(rules: Vec<AlertRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            ..Self::default()
        }
    }

    fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn set_rules(&self, rules: Vec<AlertRule>) {
        *self.rules.lock().unwrap() = rules;
    }

    fn history(&self) -> Vec<AlertHistory> {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait]
impl RuleStore for MockStore {
    async fn load_active_rules(&self) -> Result<Vec<AlertRule>> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("database unavailable");
        }
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn touch_last_triggered(&self, rule_id: &str, at: DateTime<Utc>) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("database unavailable");
        }
        for rule in self.rules.lock().unwrap().iter_mut() {
            if rule.id == rule_id {
                rule.last_triggered_at = Some(at);
            }
        }
        Ok(())
    }

    async fn insert_history(&self, entry: &AlertHistory) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("database unavailable");
        }
        self.history.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MemoryCache {
    blob: Mutex<Option<Vec<u8>>>,
}

impl RuleCache for MemoryCache {
    fn get(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.blob.lock().unwrap().clone())
    }

    fn put(&self, snapshot: &[u8]) -> Result<()> {
        *self.blob.lock().unwrap() = Some(snapshot.to_vec());
        Ok(())
    }
}

struct RecordingChannel {
    kind: Channel,
    fail: bool,
    sent: Arc<Mutex<Vec<String>>>,
}

impl RecordingChannel {
    fn new(kind: Channel) -> (Box<dyn NotificationChannel>, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Self {
                kind,
                fail: false,
                sent: sent.clone(),
            }),
            sent,
        )
    }

    fn failing(kind: Channel) -> Box<dyn NotificationChannel> {
        Box::new(Self {
            kind,
            fail: true,
            sent: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn channel(&self) -> Channel {
        self.kind
    }

    async fn send(&self, _rule: &AlertRule, _value: f64, message: &str) -> Result<()> {
        if self.fail {
            bail!("delivery refused");
        }
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Always errors; used to prove one broken evaluator cannot take the
/// pass down with it.
struct FailingEvaluator;

const FAILING_METRICS: [Metric; 1] = [Metric::Cpu];

impl MetricEvaluator for FailingEvaluator {
    fn name(&self) -> &str {
        "failing"
    }

    fn supported_metrics(&self) -> &[Metric] {
        &FAILING_METRICS
    }

    fn evaluate(&self, _rule: &AlertRule) -> Result<EvaluationResult> {
        Err(anyhow!("synthetic evaluator defect"))
    }
}

/// Spins until an async task opens the gate, so it only completes when
/// the runtime thread stays free while it runs.
struct GateEvaluator {
    open: Arc<AtomicBool>,
}

const GATE_METRICS: [Metric; 1] = [Metric::Cpu];

impl MetricEvaluator for GateEvaluator {
    fn name(&self) -> &str {
        "gate"
    }

    fn supported_metrics(&self) -> &[Metric] {
        &GATE_METRICS
    }

    fn evaluate(&self, _rule: &AlertRule) -> Result<EvaluationResult> {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while !self.open.load(Ordering::SeqCst) {
            if std::time::Instant::now() >= deadline {
                bail!("gate never opened");
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        Ok(EvaluationResult::triggered_unrendered(100.0))
    }
}

fn engine(
    store: Arc<MockStore>,
    cache: Arc<MemoryCache>,
    snapshot: Arc<StubSnapshot>,
    channels: Vec<Box<dyn NotificationChannel>>,
) -> AlertEvaluator {
    AlertEvaluator::new(
        store,
        cache,
        evaluators::builtin(snapshot),
        NotificationDispatcher::new(channels),
    )
}

#[tokio::test]
async fn builtin_registry_covers_every_metric_exactly_once() {
    let snapshot = Arc::new(StubSnapshot::default());
    let store = Arc::new(MockStore::default());
    let cache = Arc::new(MemoryCache::default());
    let engine = engine(store, cache, snapshot, Vec::new());
    engine.verify_coverage().unwrap();
}

#[tokio::test]
async fn duplicate_metric_ownership_fails_coverage() {
    let snapshot = Arc::new(StubSnapshot::default());
    let mut evaluators = evaluators::builtin(snapshot);
    evaluators.push(Box::new(FailingEvaluator));
    let engine = AlertEvaluator::new(
        Arc::new(MockStore::default()),
        Arc::new(MemoryCache::default()),
        evaluators,
        NotificationDispatcher::new(Vec::new()),
    );
    let err = engine.verify_coverage().unwrap_err();
    assert!(err.to_string().contains("more than one"));
}

#[tokio::test]
async fn disk_above_threshold_triggers_with_fallback_message() {
    let snapshot = Arc::new(StubSnapshot::default());
    snapshot.set_resource(Metric::Disk, 92.0);

    let mut rule = make_rule(Metric::Disk, Condition::Above, 90.0);
    rule.notification_channels.insert(Channel::Slack);
    let store = Arc::new(MockStore::with_rules(vec![rule]));
    let cache = Arc::new(MemoryCache::default());
    let (slack, sent) = RecordingChannel::new(Channel::Slack);

    let engine = engine(store.clone(), cache, snapshot, vec![slack]);
    engine.evaluate().await;

    let history = store.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].current_value, 92.0);
    assert!(history[0].notification_sent);
    assert_eq!(history[0].notification_channel, "slack");
    assert_eq!(
        history[0].message,
        "[WARNING] disk rule - disk is above 92 (threshold: above 90)"
    );
    assert_eq!(sent.lock().unwrap().as_slice(), [history[0].message.clone()]);
}

#[tokio::test]
async fn service_down_message_names_the_service() {
    let snapshot = Arc::new(StubSnapshot::default());
    snapshot.set_service_active("nginx", false);

    let mut rule = make_rule(Metric::ServiceDown, Condition::Below, 1.0);
    rule.config
        .insert("service_name".to_string(), serde_json::json!("nginx"));
    let store = Arc::new(MockStore::with_rules(vec![rule]));

    let engine = engine(
        store.clone(),
        Arc::new(MemoryCache::default()),
        snapshot,
        Vec::new(),
    );
    engine.evaluate().await;

    let history = store.history();
    assert_eq!(history.len(), 1);
    assert!(history[0].message.contains("nginx"));
    assert!(history[0].message.contains("is down"));
}

#[tokio::test]
async fn cooldown_suppresses_then_releases() {
    let snapshot = Arc::new(StubSnapshot::default());
    snapshot.set_resource(Metric::Cpu, 99.0);

    let mut rule = make_rule(Metric::Cpu, Condition::Above, 90.0);
    rule.cooldown_minutes = 10;
    rule.last_triggered_at = Some(Utc::now() - Duration::minutes(5));
    let store = Arc::new(MockStore::with_rules(vec![rule.clone()]));

    let engine = engine(
        store.clone(),
        Arc::new(MemoryCache::default()),
        snapshot,
        Vec::new(),
    );
    engine.evaluate().await;
    assert!(store.history().is_empty(), "T+5 of a 10 minute cooldown");

    rule.last_triggered_at = Some(Utc::now() - Duration::minutes(11));
    store.set_rules(vec![rule]);
    engine.evaluate().await;
    assert_eq!(store.history().len(), 1, "cooldown elapsed at T+11");
}

#[tokio::test]
async fn repeated_passes_inside_cooldown_write_one_history_row() {
    let snapshot = Arc::new(StubSnapshot::default());
    snapshot.set_resource(Metric::Memory, 97.0);

    let rule = make_rule(Metric::Memory, Condition::Above, 90.0);
    let store = Arc::new(MockStore::with_rules(vec![rule]));

    let engine = engine(
        store.clone(),
        Arc::new(MemoryCache::default()),
        snapshot,
        Vec::new(),
    );
    engine.evaluate().await;
    engine.evaluate().await;

    // touch_last_triggered from the first pass arms the cooldown.
    assert_eq!(store.history().len(), 1);
}

#[tokio::test]
async fn store_outage_falls_back_to_cached_rules() {
    let snapshot = Arc::new(StubSnapshot::default());
    snapshot.set_resource(Metric::Cpu, 50.0);

    let mut rule = make_rule(Metric::Cpu, Condition::Above, 80.0);
    rule.notification_channels.insert(Channel::Slack);
    let store = Arc::new(MockStore::with_rules(vec![rule]));
    let cache = Arc::new(MemoryCache::default());
    let (slack, sent) = RecordingChannel::new(Channel::Slack);

    let engine = engine(store.clone(), cache.clone(), snapshot.clone(), vec![slack]);

    // Healthy pass, no trigger; the cache now holds the rule set.
    engine.evaluate().await;
    assert!(store.history().is_empty());
    assert!(sent.lock().unwrap().is_empty());
    assert!(cache.get().unwrap().is_some());

    // Store dies, the reading crosses the threshold. The cached rules
    // still fire and the notification still goes out.
    store.set_fail(true);
    snapshot.set_resource(Metric::Cpu, 85.0);
    engine.evaluate().await;
    assert_eq!(sent.lock().unwrap().len(), 1, "cached rule must still alert");

    // History lands nowhere because the store rejects writes too.
    store.set_fail(false);
    assert!(store.history().is_empty());
    assert!(
        store.rules.lock().unwrap()[0].last_triggered_at.is_none(),
        "outage writes must not reach the store"
    );
}

#[tokio::test]
async fn store_recovery_refreshes_the_cache() {
    let snapshot = Arc::new(StubSnapshot::default());
    snapshot.set_resource(Metric::Cpu, 95.0);

    let rule = make_rule(Metric::Cpu, Condition::Above, 90.0);
    let store = Arc::new(MockStore::with_rules(vec![rule]));
    let cache = Arc::new(MemoryCache::default());

    let engine = engine(store.clone(), cache.clone(), snapshot, Vec::new());
    engine.evaluate().await;
    assert_eq!(store.history().len(), 1);

    // The rule is deleted while the store is healthy; the next pass
    // must rewrite the cache so a later outage cannot resurrect it.
    store.set_rules(Vec::new());
    engine.evaluate().await;

    store.set_fail(true);
    engine.evaluate().await;
    store.set_fail(false);
    assert_eq!(store.history().len(), 1, "deleted rule must stay deleted");
}

#[tokio::test]
async fn store_outage_with_empty_cache_evaluates_nothing() {
    let snapshot = Arc::new(StubSnapshot::default());
    snapshot.set_resource(Metric::Cpu, 95.0);

    let store = Arc::new(MockStore::with_rules(vec![make_rule(
        Metric::Cpu,
        Condition::Above,
        90.0,
    )]));
    store.set_fail(true);

    let engine = engine(
        store.clone(),
        Arc::new(MemoryCache::default()),
        snapshot,
        Vec::new(),
    );
    engine.evaluate().await;

    store.set_fail(false);
    assert!(store.history().is_empty());
}

#[tokio::test]
async fn broken_evaluator_does_not_stop_the_pass() {
    let snapshot = Arc::new(StubSnapshot::default());
    snapshot.set_resource(Metric::Disk, 95.0);

    let cpu_rule = make_rule(Metric::Cpu, Condition::Above, 90.0);
    let disk_rule = make_rule(Metric::Disk, Condition::Above, 90.0);
    let store = Arc::new(MockStore::with_rules(vec![cpu_rule, disk_rule]));

    // The failing evaluator is registered first, so it wins ownership
    // of cpu for this engine instance.
    let mut evaluators: Vec<Box<dyn MetricEvaluator>> = vec![Box::new(FailingEvaluator)];
    evaluators.extend(evaluators::builtin(snapshot));
    let engine = AlertEvaluator::new(
        store.clone(),
        Arc::new(MemoryCache::default()),
        evaluators,
        NotificationDispatcher::new(Vec::new()),
    );
    engine.evaluate().await;

    let history = store.history();
    assert_eq!(history.len(), 1);
    assert!(history[0].message.contains("disk"));
}

#[tokio::test]
async fn one_failed_channel_does_not_block_the_others() {
    let snapshot = Arc::new(StubSnapshot::default());
    snapshot.set_resource(Metric::Cpu, 95.0);

    let mut rule = make_rule(Metric::Cpu, Condition::Above, 90.0);
    rule.notification_channels.insert(Channel::Email);
    rule.notification_channels.insert(Channel::Slack);
    let store = Arc::new(MockStore::with_rules(vec![rule]));

    let (slack, slack_sent) = RecordingChannel::new(Channel::Slack);
    let email = RecordingChannel::failing(Channel::Email);

    let engine = engine(
        store.clone(),
        Arc::new(MemoryCache::default()),
        snapshot,
        vec![email, slack],
    );
    engine.evaluate().await;

    assert_eq!(slack_sent.lock().unwrap().len(), 1);
    let history = store.history();
    assert_eq!(history.len(), 1);
    assert!(history[0].notification_sent, "slack delivery succeeded");
    assert_eq!(history[0].notification_channel, "email,slack");
}

#[tokio::test]
async fn channel_without_config_section_does_not_count_as_sent() {
    let snapshot = Arc::new(StubSnapshot::default());
    snapshot.set_resource(Metric::Cpu, 95.0);

    let mut rule = make_rule(Metric::Cpu, Condition::Above, 90.0);
    rule.notification_channels.insert(Channel::Email);
    let store = Arc::new(MockStore::with_rules(vec![rule]));

    // The rule names email but no email channel was built.
    let engine = engine(
        store.clone(),
        Arc::new(MemoryCache::default()),
        snapshot,
        Vec::new(),
    );
    engine.evaluate().await;

    let history = store.history();
    assert_eq!(history.len(), 1);
    assert!(!history[0].notification_sent, "nothing was actually delivered");
    assert_eq!(history[0].notification_channel, "email");
}

#[tokio::test]
async fn blocking_probe_does_not_starve_the_runtime() {
    let open = Arc::new(AtomicBool::new(false));
    let store = Arc::new(MockStore::with_rules(vec![make_rule(
        Metric::Cpu,
        Condition::Above,
        90.0,
    )]));

    let engine = AlertEvaluator::new(
        store.clone(),
        Arc::new(MemoryCache::default()),
        vec![Box::new(GateEvaluator { open: open.clone() })],
        NotificationDispatcher::new(Vec::new()),
    );

    // Only this task can open the gate, and it can only run while the
    // evaluator occupies a blocking thread instead of the runtime.
    let opener = tokio::spawn(async move {
        open.store(true, Ordering::SeqCst);
    });
    engine.evaluate().await;
    opener.await.unwrap();

    assert_eq!(store.history().len(), 1);
}

#[tokio::test]
async fn all_channels_failing_records_nothing_sent() {
    let snapshot = Arc::new(StubSnapshot::default());
    snapshot.set_resource(Metric::Cpu, 95.0);

    let mut rule = make_rule(Metric::Cpu, Condition::Above, 90.0);
    rule.notification_channels.insert(Channel::Email);
    let store = Arc::new(MockStore::with_rules(vec![rule]));

    let engine = engine(
        store.clone(),
        Arc::new(MemoryCache::default()),
        snapshot,
        vec![RecordingChannel::failing(Channel::Email)],
    );
    engine.evaluate().await;

    let history = store.history();
    assert_eq!(history.len(), 1);
    assert!(!history[0].notification_sent);
    assert_eq!(history[0].notification_channel, "email");
}
