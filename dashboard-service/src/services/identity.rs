//! Identity provider client.
//!
//! The provider owns users and sessions; the dashboard validates access
//! tokens, exchanges credentials for sessions, and looks users up by email
//! when adding project members.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::observability::TracedClientExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use super::error::IdentityError;
use crate::config::IdentitySettings;
use crate::models::{Identity, SessionTokens};

/// Users fetched per admin listing page.
const ADMIN_PAGE_SIZE: usize = 200;
/// Upper bound on pages scanned by an email lookup.
const ADMIN_MAX_PAGES: usize = 50;

#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub identity: Identity,
    /// Present when the provider confirms accounts immediately.
    pub session: Option<SessionTokens>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate an access token and return the identity it belongs to.
    /// `request_id` correlates the call with the inbound request.
    async fn get_user(
        &self,
        access_token: &str,
        request_id: Option<&str>,
    ) -> Result<Identity, IdentityError>;

    async fn refresh_session(
        &self,
        refresh_token: &str,
        request_id: Option<&str>,
    ) -> Result<SessionTokens, IdentityError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionTokens, IdentityError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, IdentityError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;

    /// Admin lookup; requires the service key.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError>;
}

/// GoTrue-compatible provider reached over HTTP.
pub struct HttpIdentityProvider {
    client: Client,
    settings: IdentitySettings,
}

#[derive(Deserialize)]
struct AdminUserPage {
    #[serde(default)]
    users: Vec<Identity>,
}

impl HttpIdentityProvider {
    pub fn new(settings: IdentitySettings) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build identity provider client: {}", e))?;

        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.settings.url.trim_end_matches('/'), path)
    }

    fn public_key(&self) -> &str {
        self.settings.public_key.expose_secret()
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
        request_id: Option<&str>,
    ) -> Result<Response, IdentityError> {
        self.client
            .traced_post(&self.url("/token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", self.public_key())
            .json(&body)
            .request_id(request_id)
            .send()
            .await
            .map_err(IdentityError::from_transport)
    }
}

/// Best-effort human message from a provider error body.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();

    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("status {}", status))
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, IdentityError> {
    response
        .json::<T>()
        .await
        .map_err(|e| IdentityError::Upstream(format!("malformed body: {}", e)))
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn get_user(
        &self,
        access_token: &str,
        request_id: Option<&str>,
    ) -> Result<Identity, IdentityError> {
        let response = self
            .client
            .traced_get(&self.url("/user"))
            .header("apikey", self.public_key())
            .bearer_auth(access_token)
            .request_id(request_id)
            .send()
            .await
            .map_err(IdentityError::from_transport)?;

        match response.status() {
            status if status.is_success() => parse_json(response).await,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(IdentityError::InvalidSession),
            status => Err(IdentityError::Upstream(format!("user lookup returned {}", status))),
        }
    }

    async fn refresh_session(
        &self,
        refresh_token: &str,
        request_id: Option<&str>,
    ) -> Result<SessionTokens, IdentityError> {
        let response = self
            .token_grant(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
                request_id,
            )
            .await?;

        match response.status() {
            status if status.is_success() => parse_json(response).await,
            status if status.is_client_error() => Err(IdentityError::InvalidSession),
            status => Err(IdentityError::Upstream(format!("refresh returned {}", status))),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionTokens, IdentityError> {
        let response = self
            .token_grant(
                "password",
                serde_json::json!({ "email": email, "password": password }),
                None,
            )
            .await?;

        match response.status() {
            status if status.is_success() => parse_json(response).await,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(IdentityError::InvalidCredentials)
            }
            status if status.is_client_error() => {
                Err(IdentityError::Rejected(error_message(response).await))
            }
            status => Err(IdentityError::Upstream(format!("sign-in returned {}", status))),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, IdentityError> {
        let response = self
            .client
            .traced_post(&self.url("/signup"))
            .header("apikey", self.public_key())
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(IdentityError::from_transport)?;

        let status = response.status();
        if status.is_client_error() {
            return Err(IdentityError::Rejected(error_message(response).await));
        }
        if !status.is_success() {
            return Err(IdentityError::Upstream(format!("sign-up returned {}", status)));
        }

        // Auto-confirming providers answer with a session, others with the
        // bare user awaiting email confirmation.
        let body: serde_json::Value = parse_json(response).await?;
        if body.get("access_token").is_some() {
            let session: SessionTokens = serde_json::from_value(body)
                .map_err(|e| IdentityError::Upstream(format!("malformed session: {}", e)))?;
            return Ok(SignUpOutcome {
                identity: session.identity.clone(),
                session: Some(session),
            });
        }

        let identity: Identity = serde_json::from_value(body)
            .map_err(|e| IdentityError::Upstream(format!("malformed user: {}", e)))?;
        Ok(SignUpOutcome {
            identity,
            session: None,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .client
            .traced_post(&self.url("/logout"))
            .header("apikey", self.public_key())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(IdentityError::from_transport)?;

        match response.status() {
            status if status.is_success() => Ok(()),
            // Already gone upstream; nothing left to revoke.
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(()),
            status => Err(IdentityError::Upstream(format!("logout returned {}", status))),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError> {
        let service_key = self.settings.service_key.expose_secret();
        let wanted = email.to_lowercase();

        for page in 1..=ADMIN_MAX_PAGES {
            let response = self
                .client
                .traced_get(&self.url("/admin/users"))
                .query(&[
                    ("page", page.to_string()),
                    ("per_page", ADMIN_PAGE_SIZE.to_string()),
                ])
                .header("apikey", service_key)
                .bearer_auth(service_key)
                .send()
                .await
                .map_err(IdentityError::from_transport)?;

            if !response.status().is_success() {
                return Err(IdentityError::Upstream(format!(
                    "admin user listing returned {}",
                    response.status()
                )));
            }

            let listing: AdminUserPage = parse_json(response).await?;
            let count = listing.users.len();

            if let Some(found) = listing
                .users
                .into_iter()
                .find(|user| user.email.to_lowercase() == wanted)
            {
                return Ok(Some(found));
            }
            if count < ADMIN_PAGE_SIZE {
                break;
            }
        }

        Ok(None)
    }
}

/// How the mock provider misbehaves on token validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Transport,
    Panic,
}

/// In-memory provider for tests and local runs.
#[derive(Default)]
pub struct MockIdentityProvider {
    sessions: Mutex<HashMap<String, Identity>>,
    refresh_tokens: Mutex<HashMap<String, Identity>>,
    accounts: Mutex<HashMap<String, (String, Identity)>>,
    failure: Mutex<Option<MockFailure>>,
    latency: Mutex<Option<Duration>>,
    last_request_id: Mutex<Option<String>>,
    user_lookups: AtomicUsize,
    refreshes: AtomicUsize,
}

/// Lock that survives a test thread panicking while holding it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, access_token: &str, identity: Identity) -> Self {
        lock(&self.sessions).insert(access_token.to_string(), identity);
        self
    }

    pub fn with_refresh_token(self, refresh_token: &str, identity: Identity) -> Self {
        lock(&self.refresh_tokens).insert(refresh_token.to_string(), identity);
        self
    }

    pub fn with_account(self, email: &str, password: &str, identity: Identity) -> Self {
        lock(&self.accounts).insert(email.to_lowercase(), (password.to_string(), identity));
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *lock(&self.latency) = Some(latency);
        self
    }

    pub fn fail_with(&self, failure: Option<MockFailure>) {
        *lock(&self.failure) = failure;
    }

    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Request id seen by the latest session lookup or refresh.
    pub fn last_request_id(&self) -> Option<String> {
        lock(&self.last_request_id).clone()
    }

    pub fn is_active(&self, access_token: &str) -> bool {
        lock(&self.sessions).contains_key(access_token)
    }

    fn issue(&self, identity: &Identity) -> SessionTokens {
        let access_token = format!("access-{}", Uuid::new_v4());
        let refresh_token = format!("refresh-{}", Uuid::new_v4());

        lock(&self.sessions).insert(access_token.clone(), identity.clone());
        lock(&self.refresh_tokens).insert(refresh_token.clone(), identity.clone());

        SessionTokens {
            access_token,
            refresh_token,
            expires_in: 3600,
            identity: identity.clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn get_user(
        &self,
        access_token: &str,
        request_id: Option<&str>,
    ) -> Result<Identity, IdentityError> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_request_id) = request_id.map(str::to_string);

        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = *lock(&self.failure);
        match failure {
            Some(MockFailure::Transport) => {
                return Err(IdentityError::Transport("connection refused".to_string()))
            }
            Some(MockFailure::Panic) => panic!("identity provider client panicked"),
            None => {}
        }

        lock(&self.sessions)
            .get(access_token)
            .cloned()
            .ok_or(IdentityError::InvalidSession)
    }

    async fn refresh_session(
        &self,
        refresh_token: &str,
        request_id: Option<&str>,
    ) -> Result<SessionTokens, IdentityError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_request_id) = request_id.map(str::to_string);

        let identity = lock(&self.refresh_tokens)
            .remove(refresh_token)
            .ok_or(IdentityError::InvalidSession)?;

        Ok(self.issue(&identity))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionTokens, IdentityError> {
        let identity = match lock(&self.accounts).get(&email.to_lowercase()) {
            Some((stored, identity)) if stored == password => identity.clone(),
            _ => return Err(IdentityError::InvalidCredentials),
        };

        Ok(self.issue(&identity))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, IdentityError> {
        let mut accounts = lock(&self.accounts);
        if accounts.contains_key(&email.to_lowercase()) {
            return Err(IdentityError::Rejected("User already registered".to_string()));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        accounts.insert(email.to_lowercase(), (password.to_string(), identity.clone()));

        Ok(SignUpOutcome {
            identity,
            session: None,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        lock(&self.sessions).remove(access_token);
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError> {
        let wanted = email.to_lowercase();
        let from_accounts = lock(&self.accounts)
            .get(&wanted)
            .map(|(_, identity)| identity.clone());

        Ok(from_accounts.or_else(|| {
            lock(&self.sessions)
                .values()
                .find(|identity| identity.email.to_lowercase() == wanted)
                .cloned()
        }))
    }
}
