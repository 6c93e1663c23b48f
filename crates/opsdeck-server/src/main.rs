mod config;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use config::{RulesSeedFile, ServerConfig};
use opsdeck_alert::evaluator::AlertEvaluator;
use opsdeck_alert::evaluators;
use opsdeck_common::types::{AlertRule, Category, Channel, Condition, Metric, Severity};
use opsdeck_metrics::SystemSnapshot;
use opsdeck_notify::dispatcher::NotificationDispatcher;
use opsdeck_storage::{FileRuleCache, PanelStore};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  opsdeck-server [config.toml]                          Start the evaluation engine");
    eprintln!("  opsdeck-server init-rules <config.toml> <seed.json>   Initialize alert rules from seed file");
    eprintln!("  opsdeck-server test-channel <config.toml> <channel>   Send a test notification (email|telegram|slack|discord)");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("opsdeck=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-rules") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow!("init-rules requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow!("init-rules requires <seed.json> argument")
            })?;
            run_init_rules(config_path, seed_path).await
        }
        Some("test-channel") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow!("test-channel requires <config.toml> and <channel> arguments")
            })?;
            let channel = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow!("test-channel requires <channel> argument")
            })?;
            run_test_channel(config_path, channel).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

/// Seed alert rules from a JSON file, skipping names that already exist.
async fn run_init_rules(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    opsdeck_common::id::init(config.machine_id, config.node_id);
    let store = PanelStore::new(&config.database.url).await?;

    let seed_content = std::fs::read_to_string(seed_path)
        .with_context(|| format!("Failed to read seed file '{seed_path}'"))?;
    let seed: RulesSeedFile = serde_json::from_str(&seed_content)
        .with_context(|| format!("Failed to parse seed file '{seed_path}'"))?;

    let existing: std::collections::HashSet<String> = store
        .list_rules()
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect();

    let mut created = 0u32;
    let mut skipped = 0u32;
    for entry in &seed.rules {
        if existing.contains(&entry.name) {
            tracing::warn!(name = %entry.name, "Rule already exists, skipping");
            skipped += 1;
            continue;
        }
        let rule = seed_to_rule(entry)
            .with_context(|| format!("Invalid seed rule '{}'", entry.name))?;
        store.insert_rule(&rule).await?;
        tracing::info!(name = %rule.name, metric = %rule.metric, "Seeded alert rule");
        created += 1;
    }

    tracing::info!(created, skipped, "Rule seeding finished");
    Ok(())
}

fn seed_to_rule(entry: &config::SeedAlertRule) -> Result<AlertRule> {
    let category: Category = entry.category.parse().map_err(|e: String| anyhow!(e))?;
    let severity: Severity = entry.severity.parse().map_err(|e: String| anyhow!(e))?;
    let metric: Metric = entry.metric.parse().map_err(|e: String| anyhow!(e))?;
    let condition: Condition = entry.condition.parse().map_err(|e: String| anyhow!(e))?;

    let mut channels = BTreeSet::new();
    for name in &entry.notification_channels {
        let channel: Channel = name.parse().map_err(|e: String| anyhow!(e))?;
        channels.insert(channel);
    }

    let config = match &entry.config {
        serde_json::Value::Null => serde_json::Map::new(),
        serde_json::Value::Object(map) => map.clone(),
        other => return Err(anyhow!("rule config must be a JSON object, got {other}")),
    };

    let now = Utc::now();
    Ok(AlertRule {
        id: opsdeck_common::id::next_id(),
        name: entry.name.clone(),
        category,
        severity,
        metric,
        condition,
        threshold: entry.threshold,
        duration_seconds: entry.duration_seconds,
        notification_channels: channels,
        config,
        is_active: entry.is_active,
        cooldown_minutes: entry.cooldown_minutes,
        last_triggered_at: None,
        created_at: now,
        updated_at: now,
    })
}

/// Send one synthetic alert through a single configured channel.
async fn run_test_channel(config_path: &str, channel: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    opsdeck_common::id::init(config.machine_id, config.node_id);

    let channel: Channel = channel.parse().map_err(|e: String| anyhow!(e))?;
    let dispatcher = NotificationDispatcher::from_config(&config.notifications)?;
    if !dispatcher.configured_channels().contains(&channel) {
        return Err(anyhow!(
            "Channel '{channel}' has no configuration section in {config_path}"
        ));
    }

    dispatcher.send_test(channel).await?;
    tracing::info!(channel = %channel, "Test notification delivered");
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    opsdeck_common::id::init(config.machine_id, config.node_id);

    tracing::info!(
        config = %config_path,
        interval_secs = config.evaluate_interval_secs,
        "opsdeck-server starting"
    );

    let store = Arc::new(PanelStore::new(&config.database.url).await?);
    let cache = Arc::new(FileRuleCache::new(Path::new(&config.database.data_dir))?);
    let snapshot = Arc::new(SystemSnapshot::new(config.snapshot.clone()));
    let dispatcher = NotificationDispatcher::from_config(&config.notifications)?;
    for channel in dispatcher.configured_channels() {
        tracing::info!(channel = %channel, "Notification channel configured");
    }

    let engine = AlertEvaluator::new(
        store,
        cache,
        evaluators::builtin(snapshot),
        dispatcher,
    );
    // A metric nobody owns would silently never alert; refuse to start.
    engine.verify_coverage()?;

    let mut tick = interval(Duration::from_secs(config.evaluate_interval_secs));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                engine.evaluate().await;
            }
            _ = signal::ctrl_c() => {
                tracing::info!("Shutting down gracefully");
                break;
            }
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}
