use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    AnonKey,
    ServiceKey,
    JwtSecret,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::AnonKey => "anon_key",
            CredentialType::ServiceKey => "service_key",
            CredentialType::JwtSecret => "jwt_secret",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issued credential. Rotation deactivates the row and inserts a new
/// one; values are never rewritten in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    pub project_id: String,
    pub credential_type: CredentialType,
    pub credential_value: String,
    pub is_active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

/// Connection details shown to project admins.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialsDisplay {
    pub api_url: String,
    pub anon_key: Option<Credential>,
    pub service_key: Option<Credential>,
    pub jwt_secret: Option<Credential>,
    pub database_url: Option<String>,
}

impl CredentialsDisplay {
    pub fn assemble(
        api_url: String,
        database_url: Option<String>,
        credentials: Vec<Credential>,
    ) -> Self {
        let pick = |kind: CredentialType| {
            credentials
                .iter()
                .find(|c| c.credential_type == kind && c.is_active)
                .cloned()
        };

        Self {
            anon_key: pick(CredentialType::AnonKey),
            service_key: pick(CredentialType::ServiceKey),
            jwt_secret: pick(CredentialType::JwtSecret),
            api_url,
            database_url,
        }
    }
}
