use axum::{http::StatusCode, response::Json};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Error body legacy clients expect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Log a failed request and map it to its legacy status and body
pub fn reject(error: AdapterError) -> ApiError {
    warn!("Request failed: {}", error);
    (
        error.status_code(),
        Json(ErrorResponse::new(&error.to_string())),
    )
}
