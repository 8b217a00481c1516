//! Per-project authorization.
//!
//! Every project-scoped handler calls one of the `require_*` functions
//! before touching memberships, credentials or project state.

use axum::{extract::FromRequestParts, http::request::Parts};
use service_core::error::AppError;
use std::future::Future;

use crate::models::{AuthSession, Role};
use crate::services::{ProjectStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Authorized(Role),
    Forbidden(String),
}

/// Project operations gated by a minimum role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    View,
    Update,
    ViewCredentials,
    ManageMembers,
    RegenerateCredential,
}

impl ProjectAction {
    pub fn threshold(self) -> Role {
        match self {
            ProjectAction::View => Role::Viewer,
            ProjectAction::Update
            | ProjectAction::ViewCredentials
            | ProjectAction::ManageMembers => Role::Admin,
            ProjectAction::RegenerateCredential => Role::Owner,
        }
    }

    fn denial(self) -> &'static str {
        match self {
            ProjectAction::View => "You do not have access to this project",
            ProjectAction::Update => "Only project owners and admins can update the project",
            ProjectAction::ViewCredentials => "Only project owners and admins can view credentials",
            ProjectAction::ManageMembers => "Only project owners and admins can manage members",
            ProjectAction::RegenerateCredential => "Only project owner can regenerate credentials",
        }
    }
}

/// Grant when the looked-up role meets `requirement`. A missing role is
/// forbidden; a failed lookup is an upstream failure, never a grant.
pub async fn authorize<F, Fut>(requirement: Role, lookup: F) -> Result<Authorization, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<Role>, StoreError>>,
{
    let held = lookup().await?;

    Ok(match held {
        Some(role) if role >= requirement => Authorization::Authorized(role),
        Some(role) => Authorization::Forbidden(format!(
            "Requires {} role, caller is {}",
            requirement, role
        )),
        None => Authorization::Forbidden("Not a member of this project".to_string()),
    })
}

/// Membership-based check for `action` on `project_id`.
pub async fn require_project_role(
    store: &dyn ProjectStore,
    session: &AuthSession,
    project_id: &str,
    action: ProjectAction,
) -> Result<Role, AppError> {
    let authorization = authorize(action.threshold(), || async {
        let membership = store
            .find_membership(session, project_id, session.user_id())
            .await?;
        Ok::<_, StoreError>(membership.map(|m| m.role))
    })
    .await?;

    match authorization {
        Authorization::Authorized(role) => Ok(role),
        Authorization::Forbidden(reason) => {
            tracing::info!(
                user_id = %session.user_id(),
                project_id = %project_id,
                action = ?action,
                reason = %reason,
                "Project access denied"
            );
            Err(AppError::Forbidden(anyhow::anyhow!(action.denial())))
        }
    }
}

/// Ownership check against the project record itself.
pub async fn require_project_owner(
    store: &dyn ProjectStore,
    session: &AuthSession,
    project_id: &str,
) -> Result<(), AppError> {
    let authorization = authorize(Role::Owner, || async {
        let project = store.get_project(session, project_id).await?;
        Ok::<_, StoreError>(
            project
                .filter(|project| project.owner_id == session.user_id())
                .map(|_| Role::Owner),
        )
    })
    .await?;

    match authorization {
        Authorization::Authorized(_) => Ok(()),
        Authorization::Forbidden(_) => {
            tracing::info!(
                user_id = %session.user_id(),
                project_id = %project_id,
                "Project deletion denied"
            );
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Only project owner can delete"
            )))
        }
    }
}

/// The session the route guard attached. Absent means the handler was
/// reached without passing the guard, which is always a 401.
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthSession>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn check(requirement: Role, held: Option<Role>) -> Authorization {
        authorize(requirement, || async move { Ok::<_, StoreError>(held) }).await.unwrap()
    }

    #[tokio::test]
    async fn thresholds_are_monotone() {
        for requirement in Role::ALL {
            for held in Role::ALL {
                let granted = matches!(
                    check(requirement, Some(held)).await,
                    Authorization::Authorized(_)
                );
                assert_eq!(granted, held >= requirement, "{} vs {}", held, requirement);

                if granted {
                    for higher in Role::ALL.into_iter().filter(|r| *r > held) {
                        assert!(matches!(
                            check(requirement, Some(higher)).await,
                            Authorization::Authorized(_)
                        ));
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn non_members_are_forbidden() {
        for requirement in Role::ALL {
            assert!(matches!(check(requirement, None).await, Authorization::Forbidden(_)));
        }
    }

    #[tokio::test]
    async fn lookup_failure_is_not_a_grant() {
        let result = authorize(Role::Viewer, || async {
            Err::<Option<Role>, _>(StoreError::Transport("connection refused".to_string()))
        })
        .await;

        assert!(matches!(result, Err(AppError::UpstreamFailure(_))));
    }

    #[test]
    fn action_thresholds() {
        assert_eq!(ProjectAction::View.threshold(), Role::Viewer);
        assert_eq!(ProjectAction::Update.threshold(), Role::Admin);
        assert_eq!(ProjectAction::ViewCredentials.threshold(), Role::Admin);
        assert_eq!(ProjectAction::ManageMembers.threshold(), Role::Admin);
        assert_eq!(ProjectAction::RegenerateCredential.threshold(), Role::Owner);
    }
}
