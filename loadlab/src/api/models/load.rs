use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::STATUS_SUCCESS;
use crate::load::LoadReport;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoadResponse {
    #[schema(example = "success")]
    pub status: String,
    #[schema(example = "CPU load generated for 3 factor.")]
    pub message: String,
}

impl From<&LoadReport> for LoadResponse {
    fn from(report: &LoadReport) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: report.message(),
        }
    }
}
