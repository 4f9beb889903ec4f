//! Shared models
//!
//! Types stored by the submission service and read by the dashboard service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Role supplied by the authenticating gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Executive,
    Staff,
    Public,
}

/// Access tier a role grants
///
/// Ordered from least to most privileged so tiers can be compared directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    Restricted,
    Standard,
    Elevated,
}

impl UserRole {
    pub fn tier(self) -> AccessTier {
        match self {
            UserRole::Admin | UserRole::Executive => AccessTier::Elevated,
            UserRole::Staff => AccessTier::Standard,
            UserRole::Public => AccessTier::Restricted,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Executive => "executive",
            UserRole::Staff => "staff",
            UserRole::Public => "public",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "executive" => Ok(UserRole::Executive),
            "staff" => Ok(UserRole::Staff),
            "public" => Ok(UserRole::Public),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

/// Upload lifecycle status
///
/// pending → processing → completed | failed | rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Upload record created, processing not started
    Pending,
    /// Rows are being decoded, validated and stored
    Processing,
    /// At least one row was accepted
    Completed,
    /// File-level failure (format, corrupt content, row limit, storage)
    Failed,
    /// Every row failed validation
    Rejected,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
            UploadStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::Failed | UploadStatus::Rejected
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        match (self, next) {
            (UploadStatus::Pending, UploadStatus::Processing) => true,
            (UploadStatus::Pending, UploadStatus::Failed) => true,
            (UploadStatus::Processing, next) => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UploadStatus::Pending),
            "processing" => Ok(UploadStatus::Processing),
            "completed" => Ok(UploadStatus::Completed),
            "failed" => Ok(UploadStatus::Failed),
            "rejected" => Ok(UploadStatus::Rejected),
            other => Err(Error::InvalidInput(format!("Invalid status: {}", other))),
        }
    }
}

/// Declared type of a template column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Date,
    Number,
}

/// One recognized column of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub required: bool,
    /// Dropped from the medium projection
    #[serde(default)]
    pub sensitive: bool,
    /// When present, text values must be one of these
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            required: false,
            sensitive: false,
            allowed_values: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// Named, versioned column contract for uploads
///
/// Never updated in place: a changed contract is a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub template_id: Uuid,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub columns: Vec<ColumnSpec>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl Template {
    pub fn new(name: impl Into<String>, version: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            template_id: Uuid::new_v4(),
            name: name.into(),
            version: version.into(),
            description: None,
            columns,
            is_active: true,
            created_at: Utc::now(),
            created_by: None,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn sensitive_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.sensitive)
            .map(|c| c.name.as_str())
    }

    /// Reject column lists that could never be validated consistently
    pub fn check_columns(&self) -> crate::Result<()> {
        if self.columns.is_empty() {
            return Err(Error::InvalidInput("Template declares no columns".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            let name = column.name.trim();
            if name.is_empty() {
                return Err(Error::InvalidInput("Template column name is empty".to_string()));
            }
            if name != column.name {
                return Err(Error::InvalidInput(format!(
                    "Template column name has surrounding whitespace: {:?}",
                    column.name
                )));
            }
            if !seen.insert(name) {
                return Err(Error::InvalidInput(format!("Duplicate template column: {}", name)));
            }
        }
        Ok(())
    }
}

/// Fixed identity of the built-in template seeded at database initialization
pub const DEFAULT_TEMPLATE_ID: Uuid = Uuid::from_u128(0x6f1c_2b0e_4d1a_4c55_9a3e_0d5b_7e11_0001);

/// Built-in template: the three columns every dashboard filters on
pub fn default_template() -> Template {
    Template {
        template_id: DEFAULT_TEMPLATE_ID,
        name: "engagement_default".to_string(),
        version: "1.0".to_string(),
        description: Some("Minimum engagement submission: date, department, category".to_string()),
        columns: vec![
            ColumnSpec::new("submission_date", ColumnType::Date).required(),
            ColumnSpec::new("department", ColumnType::Text).required(),
            ColumnSpec::new("category", ColumnType::Text).required(),
        ],
        is_active: true,
        created_at: DateTime::<Utc>::UNIX_EPOCH,
        created_by: None,
    }
}
