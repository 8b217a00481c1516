use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;

use crate::authz::{require_project_owner, require_project_role, ProjectAction};
use crate::dtos::projects::{
    CreateProjectRequest, CreateProjectResponse, ProjectListResponse, ProjectResponse,
    StatsResponse, SuccessResponse, UpdateProjectRequest,
};
use crate::models::{AuthSession, ProjectChanges};
use crate::services::store::ProvisionRequest;
use crate::utils::validation::ValidatedJson;
use crate::AppState;

pub async fn list_projects(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<ProjectListResponse>, AppError> {
    let projects = state.store.list_projects(&session).await?;
    Ok(Json(ProjectListResponse { projects }))
}

/// Provision a project owned by the caller.
///
/// The description is stored by a follow-up update. If that update fails the
/// project still exists, so the response stays 201 and lists the failure
/// under `warnings`.
pub async fn create_project(
    State(state): State<AppState>,
    session: AuthSession,
    ValidatedJson(payload): ValidatedJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<CreateProjectResponse>), AppError> {
    let request = ProvisionRequest {
        project_id: payload.id.clone(),
        name: payload.name.clone(),
        template_id: payload.template_id.clone(),
        owner_id: session.user_id(),
    };

    let outcome = state.store.provision_project(&session, &request).await?;
    tracing::info!(
        user_id = %session.user_id(),
        project_id = %request.project_id,
        schema_name = outcome.schema_name.as_deref().unwrap_or("-"),
        "Project provisioned"
    );

    let mut warnings = Vec::new();

    // Provisioning only takes id and name; the description follows as an update.
    if let Some(description) = payload.description.filter(|d| !d.trim().is_empty()) {
        let changes = ProjectChanges {
            description: Some(description),
            updated_at: Utc::now(),
            ..Default::default()
        };
        if let Err(e) = state
            .store
            .update_project(&session, &request.project_id, &changes)
            .await
        {
            tracing::warn!(
                project_id = %request.project_id,
                error = %e,
                "Failed to store project description"
            );
            warnings.push("Project created without its description".to_string());
        }
    }

    let project = state
        .store
        .get_project(&session, &request.project_id)
        .await?
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Project {} provisioned but not readable",
                request.project_id
            ))
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateProjectResponse {
            success: true,
            project,
            warnings,
        }),
    ))
}

pub async fn get_project(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<ProjectResponse>, AppError> {
    require_project_role(state.store.as_ref(), &session, &id, ProjectAction::View).await?;

    let project = state
        .store
        .get_project(&session, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    Ok(Json(ProjectResponse { project }))
}

pub async fn update_project(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>, AppError> {
    require_project_role(state.store.as_ref(), &session, &id, ProjectAction::Update).await?;

    let changes = ProjectChanges {
        name: payload.name,
        description: payload.description,
        updated_at: Utc::now(),
    };

    let project = state
        .store
        .update_project(&session, &id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    tracing::info!(user_id = %session.user_id(), project_id = %id, "Project updated");
    Ok(Json(ProjectResponse { project }))
}

pub async fn delete_project(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    require_project_owner(state.store.as_ref(), &session, &id).await?;

    state.store.delete_project(&session, &id).await?;

    tracing::info!(user_id = %session.user_id(), project_id = %id, "Project deleted");
    Ok(Json(SuccessResponse::ok()))
}

pub async fn project_stats(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<StatsResponse>, AppError> {
    require_project_role(state.store.as_ref(), &session, &id, ProjectAction::View).await?;

    let stats = state.store.project_stats(&session, &id).await?;
    Ok(Json(StatsResponse { stats }))
}
