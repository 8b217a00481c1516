use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Project, ProjectStats};
use crate::utils::validation::{validate_project_id, validate_template_id};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(custom(function = "validate_project_id"))]
    pub id: String,

    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description is too long"))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_template_id"))]
    pub template_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Description is too long"))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<Project>,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub project: Project,
}

#[derive(Debug, Serialize)]
pub struct CreateProjectResponse {
    pub success: bool,
    pub project: Project,
    /// Follow-up steps that failed after the project itself was provisioned.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: ProjectStats,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
