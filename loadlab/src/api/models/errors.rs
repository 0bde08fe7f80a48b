use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of every 4xx/5xx response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Short description of what went wrong
    #[schema(example = "No file provided")]
    pub error: String,
    /// Underlying cause, only present for upstream store failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
