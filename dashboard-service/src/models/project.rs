use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Provisioning,
    Active,
    Suspended,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFeatures {
    #[serde(default)]
    pub auth: bool,
    #[serde(default)]
    pub storage: bool,
    #[serde(default)]
    pub realtime: bool,
    #[serde(default)]
    pub functions: bool,
}

impl Default for ProjectFeatures {
    fn default() -> Self {
        Self {
            auth: true,
            storage: true,
            realtime: false,
            functions: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectLimits {
    pub max_users: i64,
    pub max_storage_mb: i64,
    pub max_api_calls_per_day: i64,
}

impl Default for ProjectLimits {
    fn default() -> Self {
        Self {
            max_users: 1_000,
            max_storage_mb: 1_024,
            max_api_calls_per_day: 100_000,
        }
    }
}

/// A tenant project backed by its own database schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub schema_name: String,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub features: ProjectFeatures,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub provisioned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limits: ProjectLimits,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Partial update applied to a project row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}
