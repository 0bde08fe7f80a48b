//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for the demo endpoints
//! - **[`models`]**: Request/response data structures
//!
//! All endpoints are nested under the configured `api_base_path` (default `/api`):
//!
//! - `GET /metadata`: placement facts of the serving instance
//! - `GET /load/{factor}`: synthetic CPU load
//! - `POST /upload`: multipart upload forwarded to the object store
//!
//! OpenAPI documentation is served at `{api_base_path}/docs`.

pub mod handlers;
pub mod models;
