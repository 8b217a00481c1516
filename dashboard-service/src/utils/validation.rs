use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::BUILT_IN_TEMPLATE_IDS;

/// JSON body that has been parsed and validated.
///
/// Unparseable bodies and rule violations are both 400 `Invalid input`.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::debug!(error = %e, "Rejected request body");
            AppError::BadRequest(anyhow::anyhow!("Invalid input"))
        })?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

/// Project ids become schema names: lowercase letters, digits and dashes.
pub fn validate_project_id(id: &str) -> Result<(), ValidationError> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if id.is_empty() || id.len() > 63 || !valid_chars {
        let mut err = ValidationError::new("project_id");
        err.message = Some("must be 1-63 characters of a-z, 0-9 and '-'".into());
        return Err(err);
    }
    Ok(())
}

/// Template references are either stored template UUIDs or built-in slugs.
pub fn validate_template_id(id: &str) -> Result<(), ValidationError> {
    if Uuid::parse_str(id).is_ok() || BUILT_IN_TEMPLATE_IDS.contains(&id) {
        return Ok(());
    }
    let mut err = ValidationError::new("template_id");
    err.message = Some("must be a template UUID or a built-in template".into());
    Err(err)
}
