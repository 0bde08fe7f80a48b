//! OpenAPI documentation for the demo endpoints.

use utoipa::OpenApi;
use utoipa::openapi::server::Server;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "loadlab",
        description = "Synthetic CPU load, uploads to S3, and instance placement for cloud infrastructure demos."
    ),
    paths(
        api::handlers::metadata::get_metadata,
        api::handlers::load::generate_load,
        api::handlers::upload::upload_image,
    ),
    components(schemas(
        api::models::metadata::MetadataResponse,
        api::models::load::LoadResponse,
        api::models::upload::UploadResponse,
        api::models::upload::UploadForm,
        api::models::errors::ErrorResponse,
    )),
    tags(
        (name = "metadata", description = "Instance placement"),
        (name = "load", description = "Synthetic CPU load"),
        (name = "upload", description = "File uploads"),
    )
)]
pub struct ApiDoc;

/// The document with its server URL set to where the endpoints are mounted
pub fn api_doc(base_path: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.servers = Some(vec![Server::new(base_path)]);
    doc
}
