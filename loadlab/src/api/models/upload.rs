use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::STATUS_SUCCESS;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Image uploaded to S3!";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    #[schema(example = "success")]
    pub status: String,
    #[schema(example = "Image uploaded to S3!")]
    pub message: String,
    /// Key the object was stored under
    #[schema(example = "uploads/1700000000123-cat.png")]
    pub key: String,
}

impl UploadResponse {
    pub fn stored(key: String) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: UPLOAD_SUCCESS_MESSAGE.to_string(),
            key,
        }
    }
}

/// Multipart body accepted by the upload endpoint (documentation only)
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The file to store
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}
