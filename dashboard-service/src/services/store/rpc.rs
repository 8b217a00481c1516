//! Typed responses of the store's remote procedures.
//!
//! Every procedure answers with a single row, delivered either as an object
//! or as a one-element array. Anything else is a schema mismatch and the
//! caller fails closed.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::services::error::StoreError;

pub const PROVISION_NEW_PROJECT: &str = "provision_new_project";
pub const DELETE_PROJECT: &str = "delete_project";
pub const REGENERATE_CREDENTIALS: &str = "regenerate_credentials";
pub const ADD_PROJECT_MEMBER: &str = "add_project_member";
pub const UPDATE_MEMBER_ROLE: &str = "update_member_role";
pub const GET_PROJECT_STATS: &str = "get_project_stats";

/// Outcome shared by procedures that only report success.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcStatus {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionOutcome {
    pub success: bool,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub schema_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegeneratedCredential {
    pub success: bool,
    #[serde(default)]
    pub new_credential: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Procedures whose row carries a success flag.
pub trait RpcOutcome {
    fn success(&self) -> bool;
    fn message(&self) -> Option<&str>;
}

impl RpcOutcome for RpcStatus {
    fn success(&self) -> bool {
        self.success
    }
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl RpcOutcome for ProvisionOutcome {
    fn success(&self) -> bool {
        self.success
    }
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl RpcOutcome for RegeneratedCredential {
    fn success(&self) -> bool {
        self.success
    }
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Decode the single row a procedure returned.
pub fn decode_row<T: DeserializeOwned>(
    procedure: &str,
    body: serde_json::Value,
) -> Result<T, StoreError> {
    let row = match body {
        serde_json::Value::Object(_) => body,
        serde_json::Value::Array(mut rows) => {
            if rows.len() != 1 {
                return Err(StoreError::schema(
                    procedure,
                    format!("expected exactly one row, got {}", rows.len()),
                ));
            }
            rows.remove(0)
        }
        other => {
            return Err(StoreError::schema(
                procedure,
                format!("expected a row, got {}", json_kind(&other)),
            ))
        }
    };

    serde_json::from_value(row).map_err(|e| StoreError::schema(procedure, e.to_string()))
}

/// Turn `success: false` into a rejection carrying the procedure's message.
pub fn accepted<T: RpcOutcome>(procedure: &str, outcome: T) -> Result<T, StoreError> {
    if outcome.success() {
        return Ok(outcome);
    }
    let message = outcome
        .message()
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} failed", procedure));
    Err(StoreError::Rejected(message))
}

/// Decode and accept a provisioning row for `project_id`.
pub fn provision_outcome(
    body: serde_json::Value,
    project_id: &str,
) -> Result<ProvisionOutcome, StoreError> {
    let outcome = accepted(
        PROVISION_NEW_PROJECT,
        decode_row::<ProvisionOutcome>(PROVISION_NEW_PROJECT, body)?,
    )?;

    if let Some(provisioned) = outcome.project_id.as_deref() {
        if provisioned != project_id {
            return Err(StoreError::schema(
                PROVISION_NEW_PROJECT,
                format!("provisioned '{}' instead of '{}'", provisioned, project_id),
            ));
        }
    }
    Ok(outcome)
}

/// Decode and accept a regeneration row; the new value must be present.
pub fn regenerated_value(body: serde_json::Value) -> Result<String, StoreError> {
    let outcome = accepted(
        REGENERATE_CREDENTIALS,
        decode_row::<RegeneratedCredential>(REGENERATE_CREDENTIALS, body)?,
    )?;

    match outcome.new_credential {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(StoreError::schema(
            REGENERATE_CREDENTIALS,
            "success without a new credential",
        )),
    }
}

/// Decode and accept a plain status row.
pub fn status(procedure: &str, body: serde_json::Value) -> Result<RpcStatus, StoreError> {
    accepted(procedure, decode_row::<RpcStatus>(procedure, body)?)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectStats;
    use serde_json::json;

    #[test]
    fn rows_accepted_as_object_or_single_element_array() {
        let from_object: RpcStatus =
            decode_row(DELETE_PROJECT, json!({ "success": true })).unwrap();
        assert!(from_object.success);

        let from_array: RpcStatus =
            decode_row(DELETE_PROJECT, json!([{ "success": true, "message": "ok" }])).unwrap();
        assert_eq!(from_array.message.as_deref(), Some("ok"));
    }

    #[test]
    fn unexpected_shapes_are_schema_mismatches() {
        for body in [
            json!([]),
            json!([{ "success": true }, { "success": true }]),
            json!(null),
            json!("done"),
        ] {
            let err = decode_row::<RpcStatus>(DELETE_PROJECT, body).unwrap_err();
            assert!(matches!(err, StoreError::SchemaMismatch { .. }));
        }

        let err = decode_row::<RpcStatus>(DELETE_PROJECT, json!({ "ok": true })).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));
    }

    #[test]
    fn declined_procedures_surface_their_message() {
        let err = status(
            ADD_PROJECT_MEMBER,
            json!([{ "success": false, "message": "User is already a member" }]),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(ref m) if m == "User is already a member"));

        let err = status(UPDATE_MEMBER_ROLE, json!({ "success": false })).unwrap_err();
        assert!(matches!(err, StoreError::Rejected(ref m) if m == "update_member_role failed"));
    }

    #[test]
    fn provisioning_must_answer_for_the_requested_project() {
        let ok = provision_outcome(
            json!([{
                "success": true,
                "project_id": "proj1",
                "schema_name": "proj_proj1",
                "message": "ok"
            }]),
            "proj1",
        )
        .unwrap();
        assert_eq!(ok.schema_name.as_deref(), Some("proj_proj1"));

        let err = provision_outcome(
            json!([{ "success": true, "project_id": "other" }]),
            "proj1",
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));
    }

    #[test]
    fn regeneration_requires_a_value() {
        assert_eq!(
            regenerated_value(json!([{ "success": true, "new_credential": "k2" }])).unwrap(),
            "k2"
        );

        let err = regenerated_value(json!([{ "success": true }])).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));

        let err = regenerated_value(json!({ "success": true, "new_credential": "" })).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));
    }

    #[test]
    fn stats_row_decodes() {
        let stats: ProjectStats = decode_row(
            GET_PROJECT_STATS,
            json!([{
                "users_count": 3,
                "api_calls_count": 120,
                "storage_usage_mb": 1.5,
                "tables_count": 4,
                "rows_count": 90
            }]),
        )
        .unwrap();
        assert_eq!(stats.tables_count, 4);
        assert_eq!(stats.storage_usage_mb, 1.5);
    }
}
