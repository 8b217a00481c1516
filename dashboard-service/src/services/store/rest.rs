use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use service_core::observability::{TracedClientExt, TracedRequest};
use uuid::Uuid;

use super::rpc::{self, ProvisionOutcome};
use super::{ProjectStore, ProvisionRequest};
use crate::config::IdentitySettings;
use crate::models::{
    AuthSession, Credential, CredentialType, Membership, Project, ProjectChanges, ProjectStats,
    ProjectTemplate, Role,
};
use crate::services::error::StoreError;

const MEMBER_SELECT: &str = "*,user:user_id(id,email,user_metadata)";

/// PostgREST-backed store sharing the identity provider's base URL and keys.
pub struct RestProjectStore {
    client: Client,
    settings: IdentitySettings,
}

impl RestProjectStore {
    pub fn new(settings: IdentitySettings) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build project store client: {}", e))?;

        Ok(Self { client, settings })
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.settings.url.trim_end_matches('/'),
            table
        )
    }

    fn rpc_url(&self, procedure: &str) -> String {
        self.table_url(&format!("rpc/{}", procedure))
    }

    /// Attach the caller's credentials so row-level policies apply.
    fn as_caller(&self, request: TracedRequest, session: &AuthSession) -> TracedRequest {
        request
            .header("apikey", self.settings.public_key.expose_secret())
            .bearer_auth(&session.access_token)
            .request_id(session.request_id.as_deref())
    }

    fn as_service(&self, request: TracedRequest, session: &AuthSession) -> TracedRequest {
        let service_key = self.settings.service_key.expose_secret();
        request
            .header("apikey", service_key)
            .bearer_auth(service_key)
            .request_id(session.request_id.as_deref())
    }

    async fn fetch<T: DeserializeOwned>(&self, request: TracedRequest) -> Result<T, StoreError> {
        let response = checked(request.send().await.map_err(StoreError::from_transport)?).await?;
        response.json::<T>().await.map_err(|e| StoreError::Upstream {
            status: 200,
            message: format!("malformed body: {}", e),
        })
    }

    async fn call(
        &self,
        request: TracedRequest,
        procedure: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        tracing::debug!(procedure = %procedure, "Calling store procedure");
        self.fetch(request.json(&args)).await
    }
}

/// Pass 2xx responses through; everything else becomes `StoreError::Upstream`.
async fn checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let message = ["message", "hint", "details", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| "no detail".to_string());

    Err(StoreError::Upstream {
        status: status.as_u16(),
        message,
    })
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl ProjectStore for RestProjectStore {
    async fn list_projects(&self, session: &AuthSession) -> Result<Vec<Project>, StoreError> {
        let request = self
            .client
            .traced_get(&self.table_url("projects"))
            .query(&[
                ("select", "*"),
                ("status", "neq.deleted"),
                ("order", "created_at.desc"),
            ]);
        self.fetch(self.as_caller(request, session)).await
    }

    async fn get_project(
        &self,
        session: &AuthSession,
        project_id: &str,
    ) -> Result<Option<Project>, StoreError> {
        let request = self
            .client
            .traced_get(&self.table_url("projects"))
            .query(&[("select", "*".to_string()), ("id", eq(project_id))]);
        let rows: Vec<Project> = self.fetch(self.as_caller(request, session)).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_project(
        &self,
        session: &AuthSession,
        project_id: &str,
        changes: &ProjectChanges,
    ) -> Result<Option<Project>, StoreError> {
        let request = self
            .client
            .traced_patch(&self.table_url("projects"))
            .query(&[("id", eq(project_id))])
            .header("Prefer", "return=representation")
            .json(changes);
        let rows: Vec<Project> = self.fetch(self.as_caller(request, session)).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_membership(
        &self,
        session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let request = self
            .client
            .traced_get(&self.table_url("project_members"))
            .query(&[
                ("select", MEMBER_SELECT.to_string()),
                ("project_id", eq(project_id)),
                ("user_id", eq(user_id)),
            ]);
        let rows: Vec<Membership> = self.fetch(self.as_caller(request, session)).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_members(
        &self,
        session: &AuthSession,
        project_id: &str,
    ) -> Result<Vec<Membership>, StoreError> {
        let request = self
            .client
            .traced_get(&self.table_url("project_members"))
            .query(&[
                ("select", MEMBER_SELECT.to_string()),
                ("project_id", eq(project_id)),
                ("order", "invited_at.asc".to_string()),
            ]);
        self.fetch(self.as_caller(request, session)).await
    }

    async fn remove_member(
        &self,
        session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
    ) -> Result<(), StoreError> {
        let request = self
            .client
            .traced_delete(&self.table_url("project_members"))
            .query(&[("project_id", eq(project_id)), ("user_id", eq(user_id))]);
        checked(
            self.as_caller(request, session)
                .send()
                .await
                .map_err(StoreError::from_transport)?,
        )
        .await?;
        Ok(())
    }

    async fn list_active_credentials(
        &self,
        session: &AuthSession,
        project_id: &str,
    ) -> Result<Vec<Credential>, StoreError> {
        let request = self
            .client
            .traced_get(&self.table_url("project_credentials"))
            .query(&[
                ("select", "*".to_string()),
                ("project_id", eq(project_id)),
                ("is_active", "eq.true".to_string()),
            ]);
        self.fetch(self.as_caller(request, session)).await
    }

    async fn list_public_templates(
        &self,
        session: &AuthSession,
    ) -> Result<Vec<ProjectTemplate>, StoreError> {
        let request = self
            .client
            .traced_get(&self.table_url("project_templates"))
            .query(&[
                ("select", "*"),
                ("is_public", "eq.true"),
                ("order", "created_at.desc"),
            ]);
        self.fetch(self.as_caller(request, session)).await
    }

    async fn provision_project(
        &self,
        session: &AuthSession,
        request: &ProvisionRequest,
    ) -> Result<ProvisionOutcome, StoreError> {
        let call = self.as_service(
            self.client.traced_post(&self.rpc_url(rpc::PROVISION_NEW_PROJECT)),
            session,
        );
        let body = self
            .call(
                call,
                rpc::PROVISION_NEW_PROJECT,
                serde_json::json!({
                    "p_project_id": request.project_id,
                    "p_project_name": request.name,
                    "p_template_id": request.template_id,
                    "p_owner_id": request.owner_id,
                }),
            )
            .await?;
        rpc::provision_outcome(body, &request.project_id)
    }

    async fn delete_project(
        &self,
        session: &AuthSession,
        project_id: &str,
    ) -> Result<(), StoreError> {
        let call = self.as_caller(
            self.client.traced_post(&self.rpc_url(rpc::DELETE_PROJECT)),
            session,
        );
        let body = self
            .call(
                call,
                rpc::DELETE_PROJECT,
                serde_json::json!({ "p_project_id": project_id }),
            )
            .await?;
        rpc::status(rpc::DELETE_PROJECT, body)?;
        Ok(())
    }

    async fn regenerate_credential(
        &self,
        session: &AuthSession,
        project_id: &str,
        credential_type: CredentialType,
    ) -> Result<String, StoreError> {
        let call = self.as_caller(
            self.client.traced_post(&self.rpc_url(rpc::REGENERATE_CREDENTIALS)),
            session,
        );
        let body = self
            .call(
                call,
                rpc::REGENERATE_CREDENTIALS,
                serde_json::json!({
                    "p_project_id": project_id,
                    "p_credential_type": credential_type,
                }),
            )
            .await?;
        rpc::regenerated_value(body)
    }

    async fn add_member(
        &self,
        session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
        role: Role,
    ) -> Result<(), StoreError> {
        let call = self.as_caller(
            self.client.traced_post(&self.rpc_url(rpc::ADD_PROJECT_MEMBER)),
            session,
        );
        let body = self
            .call(
                call,
                rpc::ADD_PROJECT_MEMBER,
                serde_json::json!({
                    "p_project_id": project_id,
                    "p_user_id": user_id,
                    "p_role": role,
                    "p_invited_by": session.user_id(),
                }),
            )
            .await?;
        rpc::status(rpc::ADD_PROJECT_MEMBER, body)?;
        Ok(())
    }

    async fn update_member_role(
        &self,
        session: &AuthSession,
        project_id: &str,
        user_id: Uuid,
        role: Role,
    ) -> Result<(), StoreError> {
        let call = self.as_caller(
            self.client.traced_post(&self.rpc_url(rpc::UPDATE_MEMBER_ROLE)),
            session,
        );
        let body = self
            .call(
                call,
                rpc::UPDATE_MEMBER_ROLE,
                serde_json::json!({
                    "p_project_id": project_id,
                    "p_user_id": user_id,
                    "p_new_role": role,
                }),
            )
            .await?;
        rpc::status(rpc::UPDATE_MEMBER_ROLE, body)?;
        Ok(())
    }

    async fn project_stats(
        &self,
        session: &AuthSession,
        project_id: &str,
    ) -> Result<ProjectStats, StoreError> {
        let call = self.as_caller(
            self.client.traced_post(&self.rpc_url(rpc::GET_PROJECT_STATS)),
            session,
        );
        let body = self
            .call(
                call,
                rpc::GET_PROJECT_STATS,
                serde_json::json!({ "p_project_id": project_id }),
            )
            .await?;
        rpc::decode_row(rpc::GET_PROJECT_STATS, body)
    }
}
