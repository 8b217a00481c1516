use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated user as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: String,
}

/// Tokens handed out by the identity provider on sign-in or refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(rename = "user")]
    pub identity: Identity,
}

/// Validated session of the current request.
///
/// Constructed only by the session resolver; handlers receive it through
/// the request extensions the route guard populates.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub identity: Identity,
    pub access_token: String,
    pub request_id: Option<String>,
}

impl AuthSession {
    pub fn user_id(&self) -> Uuid {
        self.identity.id
    }
}
