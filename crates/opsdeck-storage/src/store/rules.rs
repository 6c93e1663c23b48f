use chrono::{DateTime, Utc};
use opsdeck_common::types::{AlertRule, Category, Channel, Condition, Metric, Severity};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use std::collections::BTreeSet;

use crate::entities::alert_rule::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::PanelStore;

fn to_domain(m: alert_rule::Model) -> Result<AlertRule> {
    let category: Category = m.category.parse().map_err(|_| StorageError::Corrupt {
        column: "category",
        value: m.category.clone(),
    })?;
    let severity: Severity = m.severity.parse().map_err(|_| StorageError::Corrupt {
        column: "severity",
        value: m.severity.clone(),
    })?;
    let metric: Metric = m.metric.parse().map_err(|_| StorageError::Corrupt {
        column: "metric",
        value: m.metric.clone(),
    })?;
    let condition: Condition = m.condition.parse().map_err(|_| StorageError::Corrupt {
        column: "condition",
        value: m.condition.clone(),
    })?;

    let mut channels = BTreeSet::new();
    for name in m.notification_channels.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let channel: Channel = name.parse().map_err(|_| StorageError::Corrupt {
            column: "notification_channels",
            value: name.to_string(),
        })?;
        channels.insert(channel);
    }

    let config: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&m.config_json)?;

    Ok(AlertRule {
        id: m.id,
        name: m.name,
        category,
        severity,
        metric,
        condition,
        threshold: m.threshold,
        duration_seconds: m.duration_seconds as u32,
        notification_channels: channels,
        config,
        is_active: m.is_active,
        cooldown_minutes: m.cooldown_minutes as u32,
        last_triggered_at: m.last_triggered_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

fn channels_column(rule: &AlertRule) -> String {
    rule.notification_channels
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl PanelStore {
    pub async fn insert_rule(&self, rule: &AlertRule) -> Result<AlertRule> {
        let now = Utc::now().fixed_offset();
        let am = alert_rule::ActiveModel {
            id: Set(rule.id.clone()),
            name: Set(rule.name.clone()),
            category: Set(rule.category.to_string()),
            severity: Set(rule.severity.to_string()),
            metric: Set(rule.metric.to_string()),
            condition: Set(rule.condition.to_string()),
            threshold: Set(rule.threshold),
            duration_seconds: Set(rule.duration_seconds as i32),
            notification_channels: Set(channels_column(rule)),
            config_json: Set(serde_json::to_string(&rule.config)?),
            is_active: Set(rule.is_active),
            cooldown_minutes: Set(rule.cooldown_minutes as i32),
            last_triggered_at: Set(rule.last_triggered_at.map(|t| t.fixed_offset())),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        to_domain(model)
    }

    pub async fn get_rule(&self, id: &str) -> Result<Option<AlertRule>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_domain).transpose()
    }

    /// Every rule, newest first. A row that no longer parses is
    /// surfaced as an error here; use [`list_active_rules`] for the
    /// skip-and-log behavior the evaluation loop wants.
    ///
    /// [`list_active_rules`]: PanelStore::list_active_rules
    pub async fn list_rules(&self) -> Result<Vec<AlertRule>> {
        let models = Entity::find()
            .order_by(Column::CreatedAt, Order::Desc)
            .all(self.db())
            .await?;
        models.into_iter().map(to_domain).collect()
    }

    /// Active rules for the evaluation loop. An unparseable row is
    /// logged and skipped so one bad record cannot take alerting down.
    pub async fn list_active_rules(&self) -> Result<Vec<AlertRule>> {
        let models = Entity::find()
            .filter(Column::IsActive.eq(true))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        let mut rules = Vec::with_capacity(models.len());
        for model in models {
            let id = model.id.clone();
            match to_domain(model) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    tracing::warn!(rule_id = %id, error = %e, "Skipping unparseable rule row");
                }
            }
        }
        Ok(rules)
    }

    pub async fn update_rule(&self, id: &str, rule: &AlertRule) -> Result<Option<AlertRule>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(None);
        };
        let now = Utc::now().fixed_offset();
        let mut am: alert_rule::ActiveModel = m.into();
        am.name = Set(rule.name.clone());
        am.category = Set(rule.category.to_string());
        am.severity = Set(rule.severity.to_string());
        am.metric = Set(rule.metric.to_string());
        am.condition = Set(rule.condition.to_string());
        am.threshold = Set(rule.threshold);
        am.duration_seconds = Set(rule.duration_seconds as i32);
        am.notification_channels = Set(channels_column(rule));
        am.config_json = Set(serde_json::to_string(&rule.config)?);
        am.is_active = Set(rule.is_active);
        am.cooldown_minutes = Set(rule.cooldown_minutes as i32);
        am.updated_at = Set(now);
        let updated = am.update(self.db()).await?;
        Ok(Some(to_domain(updated)?))
    }

    pub async fn delete_rule(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn set_rule_active(&self, id: &str, is_active: bool) -> Result<Option<AlertRule>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(None);
        };
        let now = Utc::now().fixed_offset();
        let mut am: alert_rule::ActiveModel = m.into();
        am.is_active = Set(is_active);
        am.updated_at = Set(now);
        let updated = am.update(self.db()).await?;
        Ok(Some(to_domain(updated)?))
    }

    /// Records a trigger time. Leaves `updated_at` alone so engine
    /// writes do not look like user edits.
    pub async fn set_last_triggered(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Err(StorageError::NotFound {
                entity: "alert_rule",
                id: id.to_string(),
            });
        };
        let mut am: alert_rule::ActiveModel = m.into();
        am.last_triggered_at = Set(Some(at.fixed_offset()));
        am.update(self.db()).await?;
        Ok(())
    }
}
