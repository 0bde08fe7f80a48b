use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

use crate::storage::StorageError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data, e.g. a missing upload field
    #[error("{message}")]
    BadRequest { message: String },

    /// The object store rejected or failed the put
    #[error("Failed to upload to S3")]
    UploadFailed {
        #[source]
        source: StorageError,
    },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::UploadFailed { .. } | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::UploadFailed { .. } => "Failed to upload to S3".to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::UploadFailed { source } => {
                tracing::error!(error = %source, "S3 upload error");
            }
            Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = match &self {
            // The browser form shows `message` (falling back to `error`), so surface the store's reason
            Error::UploadFailed { source } => json!({
                "error": self.user_message(),
                "message": source.to_string(),
            }),
            _ => json!({ "error": self.user_message() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for Error {
    fn from(source: StorageError) -> Self {
        Error::UploadFailed { source }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
