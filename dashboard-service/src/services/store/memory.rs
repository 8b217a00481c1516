use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::rpc::{self, ProvisionOutcome};
use super::{ProjectStore, ProvisionRequest};
use crate::models::{
    AuthSession, Credential, CredentialType, Identity, Membership, MemberUser, Project,
    ProjectChanges, ProjectFeatures, ProjectLimits, ProjectStats, ProjectStatus, ProjectTemplate,
    Role, BUILT_IN_TEMPLATE_IDS,
};
use crate::services::error::StoreError;

#[derive(Default)]
struct State {
    projects: HashMap<String, Project>,
    members: Vec<Membership>,
    credentials: Vec<Credential>,
    templates: Vec<ProjectTemplate>,
    stats: HashMap<String, ProjectStats>,
    emails: HashMap<Uuid, String>,
    unavailable: bool,
    failing: Vec<String>,
    stale_rotation: bool,
    calls: Vec<String>,
}

/// Store kept in process memory, mirroring the remote procedures' rules.
#[derive(Default)]
pub struct InMemoryProjectStore {
    state: Mutex<State>,
}

fn schema_name(project_id: &str) -> String {
    format!("proj_{}", project_id.replace('-', "_"))
}

fn credential(project_id: &str, kind: CredentialType, created_by: Option<Uuid>) -> Credential {
    Credential {
        id: Uuid::new_v4(),
        project_id: project_id.to_string(),
        credential_type: kind,
        credential_value: format!("{}_{}", kind.as_str(), Uuid::new_v4().simple()),
        is_active: true,
        expires_at: None,
        created_at: Utc::now(),
        created_by,
    }
}

impl State {
    fn record(&mut self, call: &str) -> Result<(), StoreError> {
        self.calls.push(call.to_string());
        if self.unavailable || self.failing.iter().any(|f| f == call) {
            return Err(StoreError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn membership(&self, project_id: &str, user_id: Uuid) -> Option<&Membership> {
        self.members
            .iter()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
    }

    fn with_user(&self, mut membership: Membership) -> Membership {
        membership.user = self.emails.get(&membership.user_id).map(|email| MemberUser {
            id: membership.user_id,
            email: email.clone(),
            user_metadata: None,
        });
        membership
    }

    fn insert_membership(
        &mut self,
        project_id: &str,
        user_id: Uuid,
        role: Role,
        invited_by: Option<Uuid>,
    ) {
        let now = Utc::now();
        self.members.push(Membership {
            id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            user_id,
            role,
            invited_by,
            invited_at: now,
            joined_at: Some(now),
            user: None,
        });
    }

    fn create_project(&mut self, project_id: &str, name: &str, owner: Uuid) -> Project {
        let now = Utc::now();
        let project = Project {
            id: project_id.to_string(),
            name: name.to_string(),
            description: None,
            owner_id: owner,
            schema_name: schema_name(project_id),
            database_url: None,
            api_url: None,
            settings: serde_json::json!({}),
            features: ProjectFeatures::default(),
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
            provisioned_at: Some(now),
            last_activity_at: None,
            limits: ProjectLimits::default(),
            metadata: serde_json::json!({}),
        };

        self.projects.insert(project_id.to_string(), project.clone());
        self.insert_membership(project_id, owner, Role::Owner, None);
        for kind in [
            CredentialType::AnonKey,
            CredentialType::ServiceKey,
            CredentialType::JwtSecret,
        ] {
            self.credentials
                .push(credential(project_id, kind, Some(owner)));
        }
        project
    }
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an active project owned by `owner`, with one active credential
    /// of each type.
    pub fn seed_project(&self, project_id: &str, name: &str, owner: &Identity) -> Project {
        let mut state = self.state();
        state.emails.insert(owner.id, owner.email.clone());
        state.create_project(project_id, name, owner.id)
    }

    pub fn insert_membership(&self, project_id: &str, member: &Identity, role: Role) {
        let mut state = self.state();
        state.emails.insert(member.id, member.email.clone());
        state.insert_membership(project_id, member.id, role, None);
    }

    pub fn insert_template(&self, template: ProjectTemplate) {
        self.state().templates.push(template);
    }

    pub fn set_stats(&self, project_id: &str, stats: ProjectStats) {
        self.state().stats.insert(project_id.to_string(), stats);
    }

    /// Every subsequent call fails as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Calls to the named operation fail as if the store were unreachable.
    pub fn fail_operation(&self, call: &str) {
        self.state().failing.push(call.to_string());
    }

    /// Rotation reports a new value without persisting it.
    pub fn set_stale_rotation(&self, stale: bool) {
        self.state().stale_rotation = stale;
    }

    /// Names of the store operations invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn role_of(&self, project_id: &str, user_id: Uuid) -> Option<Role> {
        self.state().membership(project_id, user_id).map(|m| m.role)
    }

    pub fn project(&self, project_id: &str) -> Option<Project> {
        self.state().projects.get(project_id).cloned()
    }

    pub fn credentials_of(&self, project_id: &str) -> Vec<Credential> {
        self.state()
            .credentials
            .iter()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn list_projects(&self, session: &AuthSession) -> Result<Vec<Project>, StoreError> {
        let mut state = self.state();
        state.record("list_projects")?;

        let user_id = session.user_id();
        let mut projects: Vec<Project> = state
            .projects
            .values()
            .filter(|p| p.status != ProjectStatus::Deleted)
            .filter(|p| state.membership(&p.id, user_id).is_some())
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn get_project(
        &self,
        _session: &AuthSession,
        project_id: &str,
    ) -> Result<Option<Project>, StoreError> {
        let mut state = self.state();
        state.record("get_project")?;
        Ok(state
            .projects
            .get(project_id)
            .filter(|p| p.status != ProjectStatus::Deleted)
            .cloned())
    }

    async fn update_project(
        &self,
        _session: &AuthSession,
        project_id: &str,
        changes: &ProjectChanges,
    ) -> Result<Option<Project>, StoreError> {
        let mut state = self.state();
        state.record("update_project")?;

        let Some(project) = state.projects.get_mut(project_id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            project.name = name.clone();
        }
        if let Some(description) = &changes.description {
            project.description = Some(description.clone());
        }
        project.updated_at = changes.updated_at;
        Ok(Some(project.clone()))
    }

    async fn find_membership(
        &self,
        _session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let mut state = self.state();
        state.record("find_membership")?;
        Ok(state
            .membership(project_id, user_id)
            .cloned()
            .map(|m| state.with_user(m)))
    }

    async fn list_members(
        &self,
        _session: &AuthSession,
        project_id: &str,
    ) -> Result<Vec<Membership>, StoreError> {
        let mut state = self.state();
        state.record("list_members")?;
        Ok(state
            .members
            .iter()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .map(|m| state.with_user(m))
            .collect())
    }

    async fn remove_member(
        &self,
        _session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        state.record("remove_member")?;
        state
            .members
            .retain(|m| !(m.project_id == project_id && m.user_id == user_id));
        Ok(())
    }

    async fn list_active_credentials(
        &self,
        _session: &AuthSession,
        project_id: &str,
    ) -> Result<Vec<Credential>, StoreError> {
        let mut state = self.state();
        state.record("list_active_credentials")?;
        Ok(state
            .credentials
            .iter()
            .filter(|c| c.project_id == project_id && c.is_active)
            .cloned()
            .collect())
    }

    async fn list_public_templates(
        &self,
        _session: &AuthSession,
    ) -> Result<Vec<ProjectTemplate>, StoreError> {
        let mut state = self.state();
        state.record("list_public_templates")?;
        Ok(state
            .templates
            .iter()
            .filter(|t| t.is_public)
            .cloned()
            .collect())
    }

    async fn provision_project(
        &self,
        session: &AuthSession,
        request: &ProvisionRequest,
    ) -> Result<ProvisionOutcome, StoreError> {
        let mut state = self.state();
        state.record(rpc::PROVISION_NEW_PROJECT)?;

        if state.projects.contains_key(&request.project_id) {
            return Err(StoreError::Rejected(
                "Project with this ID already exists".to_string(),
            ));
        }
        if let Some(template_id) = request.template_id.as_deref() {
            let known = BUILT_IN_TEMPLATE_IDS.contains(&template_id)
                || state.templates.iter().any(|t| t.id == template_id);
            if !known {
                return Err(StoreError::Rejected("Template not found".to_string()));
            }
        }

        state
            .emails
            .insert(session.user_id(), session.identity.email.clone());
        let project = state.create_project(&request.project_id, &request.name, request.owner_id);

        Ok(ProvisionOutcome {
            success: true,
            project_id: Some(project.id),
            schema_name: Some(project.schema_name),
            message: Some("Project provisioned successfully".to_string()),
        })
    }

    async fn delete_project(
        &self,
        _session: &AuthSession,
        project_id: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        state.record(rpc::DELETE_PROJECT)?;

        if state.projects.remove(project_id).is_none() {
            return Err(StoreError::Rejected("Project not found".to_string()));
        }
        state.members.retain(|m| m.project_id != project_id);
        state.credentials.retain(|c| c.project_id != project_id);
        state.stats.remove(project_id);
        Ok(())
    }

    async fn regenerate_credential(
        &self,
        session: &AuthSession,
        project_id: &str,
        credential_type: CredentialType,
    ) -> Result<String, StoreError> {
        let mut state = self.state();
        state.record(rpc::REGENERATE_CREDENTIALS)?;

        if !state.projects.contains_key(project_id) {
            return Err(StoreError::Rejected("Project not found".to_string()));
        }

        let replacement = credential(project_id, credential_type, Some(session.user_id()));
        let value = replacement.credential_value.clone();
        if state.stale_rotation {
            return Ok(value);
        }

        for existing in state
            .credentials
            .iter_mut()
            .filter(|c| c.project_id == project_id && c.credential_type == credential_type)
        {
            existing.is_active = false;
        }
        state.credentials.push(replacement);
        Ok(value)
    }

    async fn add_member(
        &self,
        session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
        role: Role,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        state.record(rpc::ADD_PROJECT_MEMBER)?;

        if state.membership(project_id, user_id).is_some() {
            return Err(StoreError::Rejected(
                "User is already a member of this project".to_string(),
            ));
        }
        state.insert_membership(project_id, user_id, role, Some(session.user_id()));
        Ok(())
    }

    async fn update_member_role(
        &self,
        _session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
        role: Role,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        state.record(rpc::UPDATE_MEMBER_ROLE)?;

        match state
            .members
            .iter_mut()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
        {
            Some(membership) => {
                membership.role = role;
                Ok(())
            }
            None => Err(StoreError::Rejected("Member not found".to_string())),
        }
    }

    async fn project_stats(
        &self,
        _session: &AuthSession,
        project_id: &str,
    ) -> Result<ProjectStats, StoreError> {
        let mut state = self.state();
        state.record(rpc::GET_PROJECT_STATS)?;

        if let Some(stats) = state.stats.get(project_id) {
            return Ok(stats.clone());
        }
        let members = state
            .members
            .iter()
            .filter(|m| m.project_id == project_id)
            .count();
        Ok(ProjectStats {
            users_count: members as i64,
            api_calls_count: 0,
            storage_usage_mb: 0.0,
            tables_count: 0,
            rows_count: 0,
        })
    }
}
