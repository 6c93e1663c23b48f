//! SQLite-backed persistence for alert rules and trigger history.
//!
//! [`PanelStore`] is the async access layer over the panel database
//! (SeaORM, migrations run at connect time). [`FileRuleCache`] is the
//! file-backed last-known-good rule snapshot the evaluation engine
//! falls back to when the database is unreachable.

pub mod cache;
pub mod entities;
pub mod error;
pub mod store;


pub use cache::FileRuleCache;
pub use error::StorageError;
pub use store::PanelStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsdeck_alert::RuleStore;
use opsdeck_common::types::{AlertHistory, AlertRule};

#[async_trait]
impl RuleStore for PanelStore {
    async fn load_active_rules(&self) -> Result<Vec<AlertRule>> {
        Ok(self.list_active_rules().await?)
    }

    async fn touch_last_triggered(&self, rule_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.set_last_triggered(rule_id, at).await?;
        Ok(())
    }

    async fn insert_history(&self, entry: &AlertHistory) -> Result<()> {
        self.insert_alert_history(entry).await?;
        Ok(())
    }
}
