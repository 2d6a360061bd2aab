//! Record of pipeline invocations and their outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::MySqlPool;

const MAX_ERROR_LENGTH: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub function_name: String,
    pub arguments: String,
    pub result: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(name: &str, args_summary: &str, outcome: &Outcome) -> Self {
        let (result, success, error_message) = match outcome {
            Outcome::Success(value) => (Some(value.to_string()), true, None),
            Outcome::Failure(message) => (
                None,
                false,
                Some(message.chars().take(MAX_ERROR_LENGTH).collect()),
            ),
        };
        Self {
            function_name: name.to_string(),
            arguments: args_summary.to_string(),
            result,
            success,
            error_message,
            executed_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Never fails the caller: a write that cannot be completed is logged and
    /// dropped.
    async fn record_invocation(&self, name: &str, args_summary: &str, outcome: Outcome);
}

pub struct MySqlAuditLog {
    pool: MySqlPool,
}

impl MySqlAuditLog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for MySqlAuditLog {
    async fn record_invocation(&self, name: &str, args_summary: &str, outcome: Outcome) {
        let entry = AuditEntry::new(name, args_summary, &outcome);

        let result = sqlx::query(
            r#"
            INSERT INTO function_results
            (function_name, arguments, result, success, error_message, executed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.function_name)
        .bind(&entry.arguments)
        .bind(&entry.result)
        .bind(entry.success)
        .bind(&entry.error_message)
        .bind(entry.executed_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, function = name, "Failed to save function result");
        }
    }
}
