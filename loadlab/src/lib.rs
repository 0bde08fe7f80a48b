//! # loadlab: cloud demo backend
//!
//! `loadlab` is the backend of a small harness for exercising cloud infrastructure. A browser form
//! calls it to make the instance burn CPU (for autoscaling, alerting and load-balancer demos), to
//! push a file into S3 through the backend, and to show which instance and availability zone
//! served the request.
//!
//! ## Endpoints
//!
//! All endpoints are nested under the configured `api_base_path` (default `/api`):
//!
//! | Method | Path | Behaviour |
//! |---|---|---|
//! | GET | `/metadata` | `{availabilityZone, instanceId}` from the instance metadata service, sentinel values on failure |
//! | GET | `/load/{factor}` | counts to `factor × 10,000,000`, then `{status, message}` |
//! | POST | `/upload` | stores multipart field `image` under `uploads/{millis}-{name}` |
//!
//! `GET /healthz` answers `OK` outside the prefix.
//!
//! ## Architecture
//!
//! Built on [Axum](https://github.com/tokio-rs/axum). Each request is independent: there is no
//! cross-request state beyond the shared clients in [`AppState`]. The three collaborators are:
//!
//! - [`metadata::MetadataClient`]: IMDSv2 token + two reads, via `reqwest`
//! - [`storage::ObjectStore`]: a single put, implemented for S3 (`aws-sdk-s3`) and in memory
//! - [`load::LoadGenerator`]: the busy loop, run on the blocking pool or inline
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use loadlab::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     loadlab::install_crypto_provider();
//!
//!     let args = loadlab::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     loadlab::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod config;
pub mod errors;
pub mod load;
pub mod metadata;
mod openapi;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa_scalar::{Scalar, Servable};

use crate::config::CorsOrigin;
use crate::load::LoadGenerator;
use crate::metadata::MetadataClient;
use crate::storage::ObjectStore;

/// Install the process-wide rustls crypto provider.
///
/// `reqwest` is built without a default provider, so this must run before any HTTP client is
/// constructed. Calling it again is harmless.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .metadata(MetadataClient::new(&config.metadata))
///     .store(storage::create_store(&config.storage).await)
///     .load(LoadGenerator::new(&config.load))
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub metadata: MetadataClient,
    pub store: Arc<dyn ObjectStore>,
    pub load: LoadGenerator,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let origins = &config.cors.allowed_origins;

    let allow_origin = if origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut values = Vec::with_capacity(origins.len());
        for origin in origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry a trailing slash
                values.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(values)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Build the main application router with all endpoints and middleware.
///
/// The demo endpoints and their OpenAPI docs are nested under `api_base_path`; `/healthz` sits at
/// the root. CORS and request tracing wrap everything.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let config = &state.config;
    let upload_limit = usize::try_from(config.upload.max_file_size).unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route("/metadata", get(api::handlers::metadata::get_metadata))
        .route("/load", get(api::handlers::load::generate_default_load))
        .route("/load/{factor}", get(api::handlers::load::generate_load))
        .route(
            "/upload",
            post(api::handlers::upload::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", openapi::api_doc(&config.api_base_path)));

    let router = Router::new().route("/healthz", get(|| async { "OK" }));

    // axum refuses to nest at the root
    let router = if config.api_base_path == "/" {
        router.merge(api_routes)
    } else {
        router.nest(&config.api_base_path, api_routes)
    };

    let router = router.layer(create_cors_layer(config)?).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The assembled server: configuration plus the ready-to-serve router.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] builds the metadata client, object store and load
///    generator from configuration
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all collaborators built from configuration
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting loadlab with configuration: {:#?}", config);

        let state = AppState::builder()
            .metadata(MetadataClient::new(&config.metadata))
            .store(storage::create_store(&config.storage).await)
            .load(LoadGenerator::new(&config.load))
            .config(config)
            .build();

        Self::from_state(state)
    }

    /// Create an application around pre-built state (custom stores, test doubles)
    pub fn from_state(state: AppState) -> anyhow::Result<Self> {
        let router = build_router(&state)?;
        Ok(Self {
            router,
            config: state.config,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "loadlab listening on http://{}, endpoints under {}",
            bind_addr, self.config.api_base_path
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::config::CorsOrigin;
    use crate::test_utils::{create_test_app, create_test_config};
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use url::Url;

    #[tokio::test]
    async fn test_healthz() {
        let (app, _store) = create_test_app(create_test_config());

        let response = app.get("/healthz").await;

        response.assert_status(StatusCode::OK);
        response.assert_text("OK");
    }

    #[tokio::test]
    async fn test_endpoints_follow_base_path() {
        let mut config = create_test_config();
        config.api_base_path = "/v1".to_string();
        let (app, _store) = create_test_app(config);

        app.get("/v1/load/1").await.assert_status(StatusCode::OK);
        app.get("/api/load/1").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_root_base_path() {
        let mut config = create_test_config();
        config.api_base_path = "/".to_string();
        let (app, _store) = create_test_app(config);

        app.get("/load/1").await.assert_status(StatusCode::OK);
        app.get("/healthz").await.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_docs_served_under_base_path() {
        let (app, _store) = create_test_app(create_test_config());

        app.get("/api/docs").await.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin_by_default() {
        let (app, _store) = create_test_app(create_test_config());

        let response = app
            .get("/healthz")
            .add_header(HeaderName::from_static("origin"), HeaderValue::from_static("http://form.example.com"))
            .await;

        response.assert_header("access-control-allow-origin", "*");
    }

    #[tokio::test]
    async fn test_cors_specific_origin() {
        let mut config = create_test_config();
        config.cors.allowed_origins = vec![CorsOrigin::Url(Url::parse("https://form.example.com").unwrap())];
        let (app, _store) = create_test_app(config);

        let response = app
            .get("/healthz")
            .add_header(HeaderName::from_static("origin"), HeaderValue::from_static("https://form.example.com"))
            .await;

        response.assert_header("access-control-allow-origin", "https://form.example.com");
    }
}
