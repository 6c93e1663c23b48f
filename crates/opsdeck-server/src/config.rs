use opsdeck_metrics::SnapshotConfig;
use opsdeck_notify::config::NotificationConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Seconds between evaluation passes.
    #[serde(default = "default_evaluate_interval_secs")]
    pub evaluate_interval_secs: u64,
    /// Snowflake generator coordinates, 0-31 each.
    #[serde(default = "default_machine_id")]
    pub machine_id: i32,
    #[serde(default = "default_node_id")]
    pub node_id: i32,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_url")]
    pub url: String,
    /// Local directory for the rule cache and other engine files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_evaluate_interval_secs() -> u64 {
    60
}

fn default_machine_id() -> i32 {
    1
}

fn default_node_id() -> i32 {
    1
}

fn default_db_url() -> String {
    "sqlite://data/opsdeck.db?mode=rwc".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

// ---- Rules seed file types (used by `init-rules` CLI subcommand) ----

#[derive(Debug, Clone, Deserialize)]
pub struct RulesSeedFile {
    #[serde(default)]
    pub rules: Vec<SeedAlertRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAlertRule {
    pub name: String,
    pub category: String,
    #[serde(default = "default_seed_severity")]
    pub severity: String,
    pub metric: String,
    pub condition: String,
    pub threshold: f64,
    #[serde(default)]
    pub duration_seconds: u32,
    #[serde(default)]
    pub notification_channels: Vec<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default = "default_seed_active")]
    pub is_active: bool,
    #[serde(default = "default_seed_cooldown_minutes")]
    pub cooldown_minutes: u32,
}

fn default_seed_severity() -> String {
    "warning".to_string()
}

fn default_seed_active() -> bool {
    true
}

fn default_seed_cooldown_minutes() -> u32 {
    15
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
