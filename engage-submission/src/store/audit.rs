//! Audit trail
//!
//! Administrative and upload actions are appended to `audit_log`. Entries
//! are never updated or deleted by the service.

use chrono::Utc;
use engage_common::Result;
use serde_json::Value;
use uuid::Uuid;

use super::sqlite::format_timestamp;
use super::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    FileUploaded,
    FileDeleted,
    RowsDeactivated,
    TemplateCreated,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::FileUploaded => "FILE_UPLOADED",
            AuditAction::FileDeleted => "FILE_DELETED",
            AuditAction::RowsDeactivated => "ROWS_DEACTIVATED",
            AuditAction::TemplateCreated => "TEMPLATE_CREATED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub table_name: &'static str,
    pub record_id: Option<String>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, table_name: &'static str, record_id: impl ToString) -> Self {
        Self {
            user_id: None,
            action,
            table_name,
            record_id: Some(record_id.to_string()),
            old_values: None,
            new_values: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn by_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn old_values(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn new_values(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }

    pub fn from_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

impl SqliteStore {
    pub async fn record_audit(&self, entry: &AuditEntry) -> Result<()> {
        let old_values = entry.old_values.as_ref().map(serde_json::to_string).transpose()?;
        let new_values = entry.new_values.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO audit_log (
                user_id, action, table_name, record_id, old_values, new_values,
                ip_address, user_agent, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id.map(|id| id.to_string()))
        .bind(entry.action.as_str())
        .bind(entry.table_name)
        .bind(&entry.record_id)
        .bind(old_values)
        .bind(new_values)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(format_timestamp(Utc::now()))
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
