//! Instance metadata client.
//!
//! Reads placement facts from the host's metadata service using the IMDSv2 session flow: a `PUT`
//! for a short-lived token, then one `GET` per field carrying that token. Each call is a single
//! attempt with no retry and no timeout.
//!
//! Failures are returned as [`MetadataError`]; the HTTP boundary turns them into the fixed sentinel
//! values via [`InstanceMetadata::sentinel`].

use reqwest::Client;
use url::Url;

use crate::config::MetadataConfig;

pub const TOKEN_PATH: &str = "/latest/api/token";
pub const AVAILABILITY_ZONE_PATH: &str = "/latest/meta-data/placement/availability-zone";
pub const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";

pub const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
pub const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

pub const SENTINEL_ZONE: &str = "error-zone";
pub const SENTINEL_INSTANCE: &str = "error-instance";

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Failed to reach metadata service at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Metadata service returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid metadata URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Placement facts for the instance serving the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceMetadata {
    pub availability_zone: String,
    pub instance_id: String,
}

impl InstanceMetadata {
    /// The values reported when the metadata service cannot be read
    pub fn sentinel() -> Self {
        Self {
            availability_zone: SENTINEL_ZONE.to_string(),
            instance_id: SENTINEL_INSTANCE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: Client,
    endpoint: Url,
    token_ttl_seconds: u32,
}

impl MetadataClient {
    pub fn new(config: &MetadataConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &MetadataConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            token_ttl_seconds: config.token_ttl_seconds,
        }
    }

    /// Fetch a fresh token, then the availability zone and instance id. Nothing is cached.
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn fetch(&self) -> Result<InstanceMetadata, MetadataError> {
        let token = self.session_token().await?;
        let availability_zone = self.read(AVAILABILITY_ZONE_PATH, &token).await?;
        let instance_id = self.read(INSTANCE_ID_PATH, &token).await?;

        tracing::debug!(%availability_zone, %instance_id, "Fetched instance metadata");

        Ok(InstanceMetadata {
            availability_zone,
            instance_id,
        })
    }

    async fn session_token(&self) -> Result<String, MetadataError> {
        let url = self.endpoint.join(TOKEN_PATH)?;
        let request = self
            .client
            .put(url.clone())
            .header(TOKEN_TTL_HEADER, self.token_ttl_seconds.to_string());

        self.send_for_text(url, request).await
    }

    async fn read(&self, path: &str, token: &str) -> Result<String, MetadataError> {
        let url = self.endpoint.join(path)?;
        let request = self.client.get(url.clone()).header(TOKEN_HEADER, token);

        self.send_for_text(url, request).await
    }

    async fn send_for_text(&self, url: Url, request: reqwest::RequestBuilder) -> Result<String, MetadataError> {
        let transport = |source| MetadataError::Transport {
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(transport)?;
        Ok(body.trim().to_string())
    }
}
