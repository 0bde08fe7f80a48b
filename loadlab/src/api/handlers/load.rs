//! HTTP handlers for synthetic CPU load.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    api::models::{errors::ErrorResponse, load::LoadResponse},
    errors::Result,
    load::LoadFactor,
};

#[utoipa::path(
    get,
    path = "/load/{factor}",
    tag = "load",
    summary = "Generate CPU load",
    description = "Counts to `factor × 10,000,000` before responding. \
A missing, non-numeric or non-positive factor is treated as 10. There is no upper bound unless the server sets `load.max_factor`.",
    params(
        ("factor" = String, Path, description = "Work multiplier; leading digits are used"),
    ),
    responses(
        (status = 200, description = "Load generated", body = LoadResponse),
        (status = 400, description = "Factor exceeds the configured maximum", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state))]
pub async fn generate_load(State(state): State<AppState>, Path(factor): Path<String>) -> Result<Json<LoadResponse>> {
    run(&state, LoadFactor::parse(Some(&factor))).await
}

/// `GET /load` without a factor segment
#[tracing::instrument(skip_all)]
pub async fn generate_default_load(State(state): State<AppState>) -> Result<Json<LoadResponse>> {
    run(&state, LoadFactor::parse(None)).await
}

async fn run(state: &AppState, factor: LoadFactor) -> Result<Json<LoadResponse>> {
    let report = state.load.generate(factor).await?;
    Ok(Json(LoadResponse::from(&report)))
}
