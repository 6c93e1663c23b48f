//! Shared domain types for the opsdeck control panel.
//!
//! Defines alert rules, alert history records, the enums they are built
//! from (metric, condition, severity, category, notification channel),
//! and the snowflake ID generator used across the workspace.

pub mod id;
pub mod types;
