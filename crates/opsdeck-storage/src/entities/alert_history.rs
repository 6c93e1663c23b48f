use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "alert_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Weak reference; rules may be deleted out from under history.
    pub alert_rule_id: String,
    pub current_value: f64,
    pub notification_sent: bool,
    pub notification_channel: String,
    pub message: String,
    pub severity: String,
    pub category: String,
    pub status: String,
    pub triggered_at: DateTimeWithTimeZone,
    pub resolved_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
