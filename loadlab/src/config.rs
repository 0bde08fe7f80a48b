//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `LOADLAB_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `LOADLAB_` override YAML values
//! 3. **AWS_REGION / S3_BUCKET** - Conventional variables override `storage.region` and `storage.bucket`
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `LOADLAB_STORAGE__BACKEND=memory` sets the `storage.backend` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use loadlab::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! LOADLAB_PORT=8080
//!
//! # Serve the endpoints under /v1 instead of /api
//! LOADLAB_API_BASE_PATH=/v1
//!
//! # Run the busy loop on the request task (reproduces head-of-line blocking)
//! LOADLAB_LOAD__EXECUTION=inline
//!
//! # Keep uploads in memory instead of sending them to S3
//! LOADLAB_STORAGE__BACKEND=memory
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::Error;

/// Upper bound IMDSv2 accepts for a session token TTL (6 hours).
pub const MAX_TOKEN_TTL_SECONDS: u32 = 21600;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "LOADLAB_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// Constructed once at startup and carried in [`crate::AppState`]; request handlers never read
/// the environment themselves. All fields have defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Path prefix the demo endpoints are nested under (e.g. "/api")
    pub api_base_path: String,
    /// Upload target
    pub storage: StorageConfig,
    /// Instance metadata service settings
    pub metadata: MetadataConfig,
    /// Synthetic CPU load settings
    pub load: LoadConfig,
    /// Upload request limits
    pub upload: UploadConfig,
    /// CORS settings for the browser form
    pub cors: CorsConfig,
}

/// Which object store implementation receives uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Amazon S3 (or an S3-compatible endpoint)
    #[default]
    S3,
    /// Process-local map, useful for running without AWS credentials
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Bucket that receives uploaded objects
    pub bucket: String,
    /// Region of the bucket
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<Url>,
    /// Use path-style addressing (`endpoint/bucket/key`), usually required with `endpoint_url`
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            bucket: "aws-ec2-vpc-exercise".to_string(),
            region: "ap-south-1".to_string(),
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    /// Base URL of the instance metadata service
    pub endpoint: Url,
    /// Lifetime requested for the session token, in seconds (1..=21600)
    pub token_ttl_seconds: u32,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("http://169.254.169.254").expect("static metadata URL is valid"),
            token_ttl_seconds: MAX_TOKEN_TTL_SECONDS,
        }
    }
}

/// Where the busy loop runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadExecution {
    /// On tokio's blocking pool, so other requests keep being served
    #[default]
    Isolated,
    /// Directly on the request task; blocks that runtime worker until the loop finishes
    Inline,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    pub execution: LoadExecution,
    /// Optional ceiling on the load factor. Unset means unbounded: a single request can keep a
    /// core busy for as long as the caller asks. Factors above the ceiling are rejected, never
    /// clamped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_factor: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Maximum accepted request body for uploads, in bytes
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    pub allowed_origins: Vec<CorsOrigin>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            api_base_path: "/api".to_string(),
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            load: LoadConfig::default(),
            upload: UploadConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.storage.bucket.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: storage.bucket must not be empty".to_string(),
            });
        }

        if self.storage.region.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: storage.region must not be empty".to_string(),
            });
        }

        let base = &self.api_base_path;
        if !base.starts_with('/') || (base.len() > 1 && base.ends_with('/')) {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: api_base_path ({base}) must start with '/' and must not end with '/'"
                ),
            });
        }

        if self.load.max_factor == Some(0) {
            return Err(Error::Internal {
                operation: "Config validation: load.max_factor must be at least 1 when set".to_string(),
            });
        }

        if !(1..=MAX_TOKEN_TTL_SECONDS).contains(&self.metadata.token_ttl_seconds) {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: metadata.token_ttl_seconds ({}) must be between 1 and {}",
                    self.metadata.token_ttl_seconds, MAX_TOKEN_TTL_SECONDS
                ),
            });
        }

        if self.upload.max_file_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: upload.max_file_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // LOADLAB_CONFIG names the file itself, it is not a config key
            .merge(Env::prefixed("LOADLAB_").ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(&["AWS_REGION"]).map(|_| "storage.region".into()))
            .merge(Env::raw().only(&["S3_BUCKET"]).map(|_| "storage.bucket".into()))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
