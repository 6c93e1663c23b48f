use chrono::Utc;
use opsdeck_common::types::{AlertHistory, Category, HistoryStatus, Severity};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::entities::alert_history::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::PanelStore;

fn to_domain(m: alert_history::Model) -> Result<AlertHistory> {
    let severity: Severity = m.severity.parse().map_err(|_| StorageError::Corrupt {
        column: "severity",
        value: m.severity.clone(),
    })?;
    let category: Category = m.category.parse().map_err(|_| StorageError::Corrupt {
        column: "category",
        value: m.category.clone(),
    })?;
    let status: HistoryStatus = m.status.parse().map_err(|_| StorageError::Corrupt {
        column: "status",
        value: m.status.clone(),
    })?;

    Ok(AlertHistory {
        id: m.id,
        alert_rule_id: m.alert_rule_id,
        current_value: m.current_value,
        notification_sent: m.notification_sent,
        notification_channel: m.notification_channel,
        message: m.message,
        severity,
        category,
        status,
        triggered_at: m.triggered_at.with_timezone(&Utc),
        resolved_at: m.resolved_at.map(|t| t.with_timezone(&Utc)),
    })
}

impl PanelStore {
    pub async fn insert_alert_history(&self, entry: &AlertHistory) -> Result<AlertHistory> {
        let am = alert_history::ActiveModel {
            id: Set(entry.id.clone()),
            alert_rule_id: Set(entry.alert_rule_id.clone()),
            current_value: Set(entry.current_value),
            notification_sent: Set(entry.notification_sent),
            notification_channel: Set(entry.notification_channel.clone()),
            message: Set(entry.message.clone()),
            severity: Set(entry.severity.to_string()),
            category: Set(entry.category.to_string()),
            status: Set(entry.status.to_string()),
            triggered_at: Set(entry.triggered_at.fixed_offset()),
            resolved_at: Set(entry.resolved_at.map(|t| t.fixed_offset())),
        };
        let model = am.insert(self.db()).await?;
        to_domain(model)
    }

    /// Most recent history rows, optionally filtered by rule.
    pub async fn list_recent_history(
        &self,
        rule_id: Option<&str>,
        limit: u64,
    ) -> Result<Vec<AlertHistory>> {
        let mut q = Entity::find();
        if let Some(rule_id) = rule_id {
            q = q.filter(Column::AlertRuleId.eq(rule_id));
        }
        let models = q
            .order_by(Column::TriggeredAt, Order::Desc)
            .limit(limit)
            .all(self.db())
            .await?;
        models.into_iter().map(to_domain).collect()
    }

    pub async fn acknowledge_history(&self, id: &str) -> Result<Option<AlertHistory>> {
        self.set_history_status(id, HistoryStatus::Acknowledged, false)
            .await
    }

    /// Marks the event handled and stamps `resolved_at`.
    pub async fn resolve_history(&self, id: &str) -> Result<Option<AlertHistory>> {
        self.set_history_status(id, HistoryStatus::Resolved, true)
            .await
    }

    async fn set_history_status(
        &self,
        id: &str,
        status: HistoryStatus,
        stamp_resolved: bool,
    ) -> Result<Option<AlertHistory>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(None);
        };
        let mut am: alert_history::ActiveModel = m.into();
        am.status = Set(status.to_string());
        if stamp_resolved {
            am.resolved_at = Set(Some(Utc::now().fixed_offset()));
        }
        let updated = am.update(self.db()).await?;
        Ok(Some(to_domain(updated)?))
    }
}
