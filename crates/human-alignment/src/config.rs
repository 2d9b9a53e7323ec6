//! Session and platform configuration
//!
//! Values come from explicit arguments first and fall back to environment
//! variables, mirroring how the CLI layers `--flag` over `env = ...`.

use crate::error::AlignmentError;
use crate::Result;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Default Google Cloud region
pub const DEFAULT_REGION: &str = "us-central1";

/// Length of generated bucket tokens
pub const TOKEN_LENGTH: usize = 8;

const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random lowercase-alphanumeric token of `length` characters.
pub fn generate_token(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}

fn bucket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^gs://[a-z0-9][a-z0-9._-]{1,61}[a-z0-9]$").expect("bucket pattern is valid")
    })
}

/// Check that `bucket` is a well-formed `gs://<name>` storage location.
pub fn validate_bucket(bucket: &str) -> Result<()> {
    if bucket_pattern().is_match(bucket) {
        Ok(())
    } else {
        Err(AlignmentError::InvalidBucket(bucket.to_string()))
    }
}

/// Immutable session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    project_id: String,
    region: String,
    bucket: String,
}

impl SessionConfig {
    /// Build a config, generating `gs://<project>-aip-<token>` when no bucket is given.
    pub fn new(project_id: &str, region: &str, bucket: Option<&str>) -> Result<Self> {
        let bucket = match bucket {
            Some(b) => b.trim_end_matches('/').to_string(),
            None => format!("gs://{}-aip-{}", project_id, generate_token(TOKEN_LENGTH)),
        };
        validate_bucket(&bucket)?;

        Ok(SessionConfig {
            project_id: project_id.to_string(),
            region: region.to_string(),
            bucket,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Storage location, always `gs://...` without a trailing slash
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Join a relative object path onto the bucket.
    pub fn object_uri(&self, relative: &str) -> String {
        format!("{}/{}", self.bucket, relative.trim_start_matches('/'))
    }
}

/// Vertex AI client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// API endpoint override; defaults to `https://<region>-aiplatform.googleapis.com`
    pub api_endpoint: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig {
            api_endpoint: std::env::var("VERTEX_API_ENDPOINT").ok(),
            request_timeout: Duration::from_secs(
                std::env::var("VERTEX_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}

impl PlatformConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Point the client at a specific endpoint
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.api_endpoint = Some(endpoint.trim_end_matches('/').to_string());
        self
    }

    /// Base URL for a region
    pub fn endpoint_for(&self, region: &str) -> String {
        self.api_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", region))
    }
}
