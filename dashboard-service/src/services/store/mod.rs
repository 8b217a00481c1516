//! Project data store.
//!
//! Reads and user-scoped writes run with the caller's access token so the
//! store's row-level policies apply; provisioning runs with the service key.

pub mod memory;
pub mod rest;
pub mod rpc;

use async_trait::async_trait;
use uuid::Uuid;

use super::error::StoreError;
use crate::models::{
    AuthSession, Credential, CredentialType, Membership, Project, ProjectChanges, ProjectStats,
    ProjectTemplate, Role,
};

pub use memory::InMemoryProjectStore;
pub use rest::RestProjectStore;
pub use rpc::ProvisionOutcome;

#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub project_id: String,
    pub name: String,
    pub template_id: Option<String>,
    pub owner_id: Uuid,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Projects visible to the caller, newest first, deleted ones excluded.
    async fn list_projects(&self, session: &AuthSession) -> Result<Vec<Project>, StoreError>;

    async fn get_project(
        &self,
        session: &AuthSession,
        project_id: &str,
    ) -> Result<Option<Project>, StoreError>;

    async fn update_project(
        &self,
        session: &AuthSession,
        project_id: &str,
        changes: &ProjectChanges,
    ) -> Result<Option<Project>, StoreError>;

    async fn find_membership(
        &self,
        session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;

    async fn list_members(
        &self,
        session: &AuthSession,
        project_id: &str,
    ) -> Result<Vec<Membership>, StoreError>;

    async fn remove_member(
        &self,
        session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
    ) -> Result<(), StoreError>;

    async fn list_active_credentials(
        &self,
        session: &AuthSession,
        project_id: &str,
    ) -> Result<Vec<Credential>, StoreError>;

    async fn list_public_templates(
        &self,
        session: &AuthSession,
    ) -> Result<Vec<ProjectTemplate>, StoreError>;

    async fn provision_project(
        &self,
        session: &AuthSession,
        request: &ProvisionRequest,
    ) -> Result<ProvisionOutcome, StoreError>;

    async fn delete_project(&self, session: &AuthSession, project_id: &str)
        -> Result<(), StoreError>;

    /// Rotate a credential and return the new value.
    async fn regenerate_credential(
        &self,
        session: &AuthSession,
        project_id: &str,
        credential_type: CredentialType,
    ) -> Result<String, StoreError>;

    async fn add_member(
        &self,
        session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
        role: Role,
    ) -> Result<(), StoreError>;

    async fn update_member_role(
        &self,
        session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
        role: Role,
    ) -> Result<(), StoreError>;

    async fn project_stats(
        &self,
        session: &AuthSession,
        project_id: &str,
    ) -> Result<ProjectStats, StoreError>;
}
