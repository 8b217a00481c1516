use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// The role a user holds within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub project_id: String,
    pub user_id: Uuid,
    pub role: Role,
    #[serde(default)]
    pub invited_by: Option<Uuid>,
    pub invited_at: DateTime<Utc>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<MemberUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberUser {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<MemberMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}
