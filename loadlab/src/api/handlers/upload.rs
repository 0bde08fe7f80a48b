//! HTTP handler for uploading a file into the object store.
//!
//! The whole file is buffered in memory for the duration of the request, forwarded with a single
//! put, then dropped. Nothing is written to local disk.

use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use bytes::Bytes;

use crate::{
    AppState,
    api::models::{
        errors::ErrorResponse,
        upload::{UploadForm, UploadResponse},
    },
    errors::{Error, Result},
    storage::{PutObject, object_key},
};

/// Multipart field the file is expected in
pub const UPLOAD_FIELD: &str = "image";

pub const NO_FILE_MESSAGE: &str = "No file provided";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

struct UploadedFile {
    name: String,
    content_type: String,
    body: Bytes,
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "upload",
    summary = "Upload a file",
    description = "Stores the file sent in the `image` multipart field under `uploads/{unix_millis}-{filename}` in the configured bucket.",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file in the `image` field", body = ErrorResponse),
        (status = 500, description = "The object store rejected the upload", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    // A request that is not multipart at all carries no file either
    let Ok(multipart) = multipart else {
        return Err(no_file());
    };

    let file = read_file_field(multipart).await?.ok_or_else(no_file)?;

    let key = object_key(chrono::Utc::now().timestamp_millis(), &file.name);
    tracing::info!(
        key = %key,
        content_type = %file.content_type,
        bytes = file.body.len(),
        "Uploading file to object store"
    );

    state
        .store
        .put_object(PutObject {
            bucket: state.config.storage.bucket.clone(),
            key: key.clone(),
            body: file.body,
            content_type: file.content_type,
        })
        .await?;

    Ok(Json(UploadResponse::stored(key)))
}

/// Pull the first file sent under [`UPLOAD_FIELD`]; other fields are skipped.
///
/// A part without a file name is a plain form value, not a file.
async fn read_file_field(mut multipart: Multipart) -> Result<Option<UploadedFile>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().unwrap_or(DEFAULT_CONTENT_TYPE).to_string();

        let body = field.bytes().await.map_err(multipart_error)?;

        return Ok(Some(UploadedFile { name, content_type, body }));
    }

    Ok(None)
}

/// A body that cannot be parsed as multipart carries no usable file, unless it was cut off by the
/// size limit.
fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return Error::BadRequest {
            message: format!("Upload exceeds the size limit: {e}"),
        };
    }

    tracing::debug!(error = %e, "Malformed multipart body");
    no_file()
}

fn no_file() -> Error {
    Error::BadRequest {
        message: NO_FILE_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::storage::{InMemoryObjectStore, UPLOAD_PREFIX};
    use crate::test_utils::{create_test_app, create_test_app_with_store, create_test_config};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use bytes::Bytes;
    use serde_json::{Value, json};

    fn image_form(name: &str, body: &'static [u8]) -> MultipartForm {
        MultipartForm::new().add_part("image", Part::bytes(body).file_name(name).mime_type("image/png"))
    }

    #[test_log::test(tokio::test)]
    async fn test_upload_stores_object_once() {
        let config = create_test_config();
        let bucket = config.storage.bucket.clone();
        let (app, store) = create_test_app(config);

        let before = chrono::Utc::now().timestamp_millis();
        let response = app.post("/api/upload").multipart(image_form("cat.png", b"\x89PNG")).await;
        let after = chrono::Utc::now().timestamp_millis();

        response.assert_status(StatusCode::OK);
        let json: Value = response.json();
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "Image uploaded to S3!");

        assert_eq!(store.puts(), 1);
        let keys = store.keys(&bucket);
        assert_eq!(keys.len(), 1);
        assert_eq!(json["key"], keys[0]);

        // uploads/{millis}-cat.png
        let stamp = keys[0]
            .strip_prefix(UPLOAD_PREFIX)
            .and_then(|rest| rest.strip_suffix("-cat.png"))
            .and_then(|millis| millis.parse::<i64>().ok())
            .expect("key is uploads/{millis}-cat.png");
        assert!((before..=after).contains(&stamp));

        let stored = store.get(&bucket, &keys[0]).unwrap();
        assert_eq!(stored.body, Bytes::from_static(b"\x89PNG"));
        assert_eq!(stored.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_upload_without_body_is_rejected() {
        let (app, store) = create_test_app(create_test_config());

        let response = app.post("/api/upload").await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json: Value = response.json();
        assert_eq!(json, json!({ "error": "No file provided" }));
        assert_eq!(store.puts(), 0);
    }

    #[tokio::test]
    async fn test_upload_with_other_fields_only_is_rejected() {
        let (app, store) = create_test_app(create_test_config());

        let form = MultipartForm::new()
            .add_text("image", "not a file")
            .add_part("photo", Part::bytes(b"abc".as_slice()).file_name("a.png"));
        let response = app.post("/api/upload").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json: Value = response.json();
        assert_eq!(json["error"], "No file provided");
        assert_eq!(store.puts(), 0);
    }

    #[tokio::test]
    async fn test_upload_malformed_multipart_is_no_file() {
        let (app, store) = create_test_app(create_test_config());

        let response = app
            .post("/api/upload")
            .bytes(Bytes::from_static(b"this is not a multipart body"))
            .content_type("multipart/form-data; boundary=x")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json: Value = response.json();
        assert_eq!(json, json!({ "error": "No file provided" }));
        assert_eq!(store.puts(), 0);
    }

    #[tokio::test]
    async fn test_upload_without_content_type_defaults_to_octet_stream() {
        let config = create_test_config();
        let bucket = config.storage.bucket.clone();
        let (app, store) = create_test_app(config);

        let form = MultipartForm::new().add_part("image", Part::bytes(b"data".as_slice()).file_name("blob.bin"));
        app.post("/api/upload").multipart(form).await.assert_status(StatusCode::OK);

        let keys = store.keys(&bucket);
        let stored = store.get(&bucket, &keys[0]).unwrap();
        assert!(keys[0].ends_with("-blob.bin"));
        assert_eq!(stored.content_type, "application/octet-stream");
    }

    #[test_log::test(tokio::test)]
    async fn test_upload_store_failure_returns_500() {
        let store = Arc::new(InMemoryObjectStore::failing("bucket is on fire"));
        let app = create_test_app_with_store(create_test_config(), store.clone());

        let response = app.post("/api/upload").multipart(image_form("cat.png", b"img")).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = response.json();
        assert_eq!(json["error"], "Failed to upload to S3");
        assert!(json["message"].as_str().unwrap().contains("bucket is on fire"));
        assert_eq!(store.puts(), 1);
    }

    #[tokio::test]
    async fn test_upload_over_size_limit_is_not_stored() {
        let mut config = create_test_config();
        config.upload.max_file_size = 16;
        let (app, store) = create_test_app(config);

        let response = app
            .post("/api/upload")
            .multipart(image_form("big.png", &[0u8; 1024]))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(store.puts(), 0);
    }
}
