use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::authz::{require_project_role, ProjectAction};
use crate::dtos::members::{
    AddMemberRequest, MemberListResponse, MemberResponse, UpdateMemberRoleRequest,
};
use crate::dtos::projects::SuccessResponse;
use crate::models::{AuthSession, Membership, Role};
use crate::utils::validation::ValidatedJson;
use crate::AppState;

fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid input")))
}

/// Target membership of a member mutation. The owner's membership is
/// immutable through this API.
async fn mutable_membership(
    state: &AppState,
    session: &AuthSession,
    project_id: &str,
    user_id: Uuid,
    refusal: &'static str,
) -> Result<Membership, AppError> {
    let membership = state
        .store
        .find_membership(session, project_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Member not found")))?;

    if membership.role == Role::Owner {
        return Err(AppError::Forbidden(anyhow::anyhow!(refusal)));
    }
    Ok(membership)
}

pub async fn list_members(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<MemberListResponse>, AppError> {
    require_project_role(state.store.as_ref(), &session, &id, ProjectAction::View).await?;

    let members = state.store.list_members(&session, &id).await?;
    Ok(Json(MemberListResponse { members }))
}

pub async fn add_member(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<AddMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), AppError> {
    require_project_role(
        state.store.as_ref(),
        &session,
        &id,
        ProjectAction::ManageMembers,
    )
    .await?;

    let user = state
        .identity
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    state
        .store
        .add_member(&session, &id, user.id, payload.role)
        .await?;

    let member = state
        .store
        .find_membership(&session, &id, user.id)
        .await?
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Member {} added to {} but not readable",
                user.id,
                id
            ))
        })?;

    tracing::info!(
        user_id = %session.user_id(),
        project_id = %id,
        member_id = %user.id,
        role = %payload.role,
        "Member added"
    );
    Ok((StatusCode::CREATED, Json(MemberResponse { member })))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    session: AuthSession,
    Path((id, user_id)): Path<(String, String)>,
    ValidatedJson(payload): ValidatedJson<UpdateMemberRoleRequest>,
) -> Result<Json<MemberResponse>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    require_project_role(
        state.store.as_ref(),
        &session,
        &id,
        ProjectAction::ManageMembers,
    )
    .await?;

    mutable_membership(
        &state,
        &session,
        &id,
        user_id,
        "The project owner's role cannot be changed",
    )
    .await?;

    state
        .store
        .update_member_role(&session, &id, user_id, payload.role)
        .await?;

    let member = state
        .store
        .find_membership(&session, &id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Member not found")))?;

    tracing::info!(
        user_id = %session.user_id(),
        project_id = %id,
        member_id = %user_id,
        role = %payload.role,
        "Member role updated"
    );
    Ok(Json(MemberResponse { member }))
}

pub async fn remove_member(
    State(state): State<AppState>,
    session: AuthSession,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    require_project_role(
        state.store.as_ref(),
        &session,
        &id,
        ProjectAction::ManageMembers,
    )
    .await?;

    mutable_membership(
        &state,
        &session,
        &id,
        user_id,
        "The project owner cannot be removed",
    )
    .await?;

    state.store.remove_member(&session, &id, user_id).await?;

    tracing::info!(
        user_id = %session.user_id(),
        project_id = %id,
        member_id = %user_id,
        "Member removed"
    );
    Ok(Json(SuccessResponse::ok()))
}
