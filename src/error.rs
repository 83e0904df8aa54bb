use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdapterError>;

/// Error kinds surfaced by the backend and the translation core.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Missing org, project, branch, element or artifact
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    /// Missing or unknown session ticket
    #[error("{0}")]
    Unauthorized(String),

    /// Malformed body, query or options
    #[error("{0}")]
    BadRequest(String),

    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("{0}")]
    Server(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdapterError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }

    /// HTTP status reported to legacy clients for this kind of error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdapterError::NotFound(_) => StatusCode::NOT_FOUND,
            AdapterError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AdapterError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AdapterError::BadRequest(_) => StatusCode::BAD_REQUEST,
            // Legacy clients have always seen identifier problems as server errors
            AdapterError::MalformedIdentifier(_)
            | AdapterError::Server(_)
            | AdapterError::Database(_)
            | AdapterError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
