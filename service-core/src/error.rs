use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy shared by every HTTP surface.
///
/// "Who are you" failures are 401, "you can't do that" failures are 403.
/// Anything unexpected collapses into a generic 500 without internal detail.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Upstream failure: {0}")]
    UpstreamFailure(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamFailure(_)
            | AppError::InternalError(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::Unauthorized => ErrorResponse::new("Unauthorized"),
            AppError::Forbidden(err) => ErrorResponse::new(err.to_string()),
            AppError::ValidationError(err) => ErrorResponse {
                error: "Invalid input".to_string(),
                details: Some(err.to_string()),
            },
            AppError::BadRequest(err) => ErrorResponse::new(err.to_string()),
            AppError::NotFound(err) => ErrorResponse::new(err.to_string()),
            AppError::UpstreamFailure(err) => {
                tracing::error!(error = %err, "Upstream failure");
                ErrorResponse::new("Internal server error")
            }
            AppError::InternalError(err) => {
                tracing::error!(error = ?err, "Internal error");
                ErrorResponse::new("Internal server error")
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                ErrorResponse::new("Internal server error")
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn unauthorized_and_forbidden_are_distinct() {
        let (status, body) = body_json(AppError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let (status, body) =
            body_json(AppError::Forbidden(anyhow::anyhow!("Only project owner can delete"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Only project owner can delete");
    }

    #[tokio::test]
    async fn internal_failures_do_not_leak_detail() {
        let (status, body) =
            body_json(AppError::UpstreamFailure(anyhow::anyhow!("connection refused to 10.0.0.3")))
                .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("details").is_none());

        let (_, body) = body_json(AppError::InternalError(anyhow::anyhow!("boom"))).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("details").is_none());
    }
}
