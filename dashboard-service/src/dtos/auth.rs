use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Identity, ProjectTemplate};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Identity,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: Identity,
    pub confirmation_required: bool,
}

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<ProjectTemplate>,
}
