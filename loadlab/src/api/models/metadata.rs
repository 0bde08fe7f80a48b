use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::metadata::{InstanceMetadata, MetadataError};

/// Placement of the serving instance.
///
/// Both fields are always present. When the metadata service cannot be read they hold
/// `"error-zone"` / `"error-instance"` and `message` carries the reason.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    #[schema(example = "ap-south-1a")]
    pub availability_zone: String,
    #[schema(example = "i-0123456789abcdef0")]
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<InstanceMetadata> for MetadataResponse {
    fn from(metadata: InstanceMetadata) -> Self {
        Self {
            availability_zone: metadata.availability_zone,
            instance_id: metadata.instance_id,
            message: None,
        }
    }
}

impl From<Result<InstanceMetadata, MetadataError>> for MetadataResponse {
    fn from(result: Result<InstanceMetadata, MetadataError>) -> Self {
        match result {
            Ok(metadata) => metadata.into(),
            Err(e) => Self {
                message: Some(e.to_string()),
                ..Self::from(InstanceMetadata::sentinel())
            },
        }
    }
}
