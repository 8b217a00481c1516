use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Session is invalid or expired")]
    InvalidSession,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Rejected(String),

    #[error("Identity provider timed out")]
    Timeout,

    #[error("Identity provider unreachable: {0}")]
    Transport(String),

    #[error("Unexpected identity provider response: {0}")]
    Upstream(String),
}

impl IdentityError {
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            IdentityError::Timeout
        } else {
            IdentityError::Transport(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Data store unreachable: {0}")]
    Transport(String),

    #[error("Data store returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Unexpected response from {procedure}: {reason}")]
    SchemaMismatch { procedure: String, reason: String },

    /// The remote procedure ran and declined the operation.
    #[error("{0}")]
    Rejected(String),
}

impl StoreError {
    pub fn from_transport(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }

    pub fn schema(procedure: &str, reason: impl Into<String>) -> Self {
        StoreError::SchemaMismatch {
            procedure: procedure.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidSession => AppError::Unauthorized,
            IdentityError::InvalidCredentials => {
                AppError::BadRequest(anyhow::anyhow!("Invalid email or password"))
            }
            IdentityError::Rejected(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            other => AppError::UpstreamFailure(anyhow::Error::new(other)),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            other => AppError::UpstreamFailure(anyhow::Error::new(other)),
        }
    }
}
