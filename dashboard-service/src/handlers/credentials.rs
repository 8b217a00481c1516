use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::authz::{require_project_role, ProjectAction};
use crate::dtos::credentials::{
    CredentialsResponse, RegenerateCredentialRequest, RegenerateCredentialResponse,
};
use crate::models::{AuthSession, CredentialsDisplay};
use crate::utils::validation::ValidatedJson;
use crate::AppState;

pub async fn get_credentials(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<CredentialsResponse>, AppError> {
    require_project_role(
        state.store.as_ref(),
        &session,
        &id,
        ProjectAction::ViewCredentials,
    )
    .await?;

    let project = state
        .store
        .get_project(&session, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    let credentials = state.store.list_active_credentials(&session, &id).await?;

    let api_url = project
        .api_url
        .clone()
        .unwrap_or_else(|| state.settings.identity.url.clone());

    Ok(Json(CredentialsResponse {
        credentials: CredentialsDisplay::assemble(api_url, project.database_url, credentials),
    }))
}

/// Rotate one credential. The old value is deactivated, never overwritten,
/// and the result is read back before it is reported.
pub async fn regenerate_credential(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<RegenerateCredentialRequest>,
) -> Result<Json<RegenerateCredentialResponse>, AppError> {
    require_project_role(
        state.store.as_ref(),
        &session,
        &id,
        ProjectAction::RegenerateCredential,
    )
    .await?;

    let kind = payload.credential_type;
    let new_value = state
        .store
        .regenerate_credential(&session, &id, kind)
        .await?;

    let active: Vec<_> = state
        .store
        .list_active_credentials(&session, &id)
        .await?
        .into_iter()
        .filter(|c| c.credential_type == kind)
        .collect();

    let rotated = active.len() == 1 && active[0].credential_value == new_value;
    if !rotated {
        return Err(AppError::UpstreamFailure(anyhow::anyhow!(
            "rotation of {} for {} not reflected in store ({} active)",
            kind,
            id,
            active.len()
        )));
    }

    tracing::info!(
        user_id = %session.user_id(),
        project_id = %id,
        credential_type = %kind,
        "Credential regenerated"
    );

    Ok(Json(RegenerateCredentialResponse {
        success: true,
        new_credential: new_value,
    }))
}
