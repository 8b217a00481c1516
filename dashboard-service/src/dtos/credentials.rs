use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{CredentialType, CredentialsDisplay};

#[derive(Debug, Deserialize, Validate)]
pub struct RegenerateCredentialRequest {
    pub credential_type: CredentialType,
}

#[derive(Debug, Serialize)]
pub struct CredentialsResponse {
    pub credentials: CredentialsDisplay,
}

#[derive(Debug, Serialize)]
pub struct RegenerateCredentialResponse {
    pub success: bool,
    pub new_credential: String,
}
