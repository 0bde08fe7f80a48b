//! HTTP handler for instance metadata lookup.

use axum::{Json, extract::State};

use crate::{AppState, api::models::metadata::MetadataResponse};

#[utoipa::path(
    get,
    path = "/metadata",
    tag = "metadata",
    summary = "Get instance placement",
    description = "Reads the availability zone and instance id of the serving instance from the instance metadata service. \
Never fails: when the service cannot be read, both fields hold sentinel values and `message` explains why.",
    responses(
        (status = 200, description = "Placement of the serving instance, or sentinel values", body = MetadataResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_metadata(State(state): State<AppState>) -> Json<MetadataResponse> {
    let result = state.metadata.fetch().await;

    if let Err(e) = &result {
        tracing::error!(error = %e, "Metadata fetch error");
    }

    Json(result.into())
}
