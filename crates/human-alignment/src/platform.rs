//! Vertex AI Pipelines client
//!
//! Talks to the `pipelineJobs` REST resource. The [`PipelineService`] trait is
//! what the session depends on; [`VertexPipelineService`] is the HTTP
//! implementation and [`crate::fakes::MemoryPipelineService`] the in-memory one.

use crate::auth::TokenSource;
use crate::config::PlatformConfig;
use crate::error::AlignmentError;
use crate::job::JobHandle;
use crate::template::PipelineSpec;
use crate::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, info};

fn job_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][-a-z0-9]{0,127}$").expect("job id pattern is valid"))
}

/// Check a job id against the platform's naming rules.
pub fn validate_job_id(job_id: &str) -> Result<()> {
    if job_id_pattern().is_match(job_id) {
        Ok(())
    } else {
        Err(AlignmentError::InvalidJobId(job_id.to_string()))
    }
}

/// Everything needed to create a pipeline job
#[derive(Debug, Clone, PartialEq)]
pub struct CreateJobRequest {
    pub project_id: String,
    pub region: String,
    pub job_id: String,
    pub display_name: String,
    pub pipeline_spec: PipelineSpec,
    /// `gs://` directory for pipeline outputs
    pub pipeline_root: String,
    pub parameters: Map<String, Value>,
    pub labels: BTreeMap<String, String>,
}

impl CreateJobRequest {
    /// `projects/<p>/locations/<r>`
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.region)
    }

    /// Request body for `pipelineJobs.create`
    pub fn body(&self) -> Value {
        json!({
            "displayName": self.display_name,
            "pipelineSpec": self.pipeline_spec.as_value(),
            "labels": self.labels,
            "runtimeConfig": {
                "gcsOutputDirectory": self.pipeline_root,
                "parameterValues": self.parameters,
            },
        })
    }
}

/// Remote pipeline operations
#[async_trait]
pub trait PipelineService: Send + Sync {
    /// Submit a job; returns once the platform has accepted it.
    async fn create_job(&self, request: &CreateJobRequest) -> Result<JobHandle>;

    /// Read a job by full resource name.
    async fn get_job(&self, name: &str) -> Result<JobHandle>;

    /// Download a published template document.
    async fn fetch_template(&self, uri: &str) -> Result<String>;
}

/// Region segment of `projects/<p>/locations/<r>/...`
fn region_of(resource_name: &str) -> Option<&str> {
    let mut parts = resource_name.split('/');
    while let Some(part) = parts.next() {
        if part == "locations" {
            return parts.next();
        }
    }
    None
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Vertex AI REST implementation of [`PipelineService`]
pub struct VertexPipelineService {
    config: PlatformConfig,
    http_client: reqwest::Client,
    tokens: Box<dyn TokenSource>,
}

impl VertexPipelineService {
    /// Create a new client
    pub fn new(config: PlatformConfig, tokens: Box<dyn TokenSource>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("human-alignment/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        Ok(VertexPipelineService {
            config,
            http_client,
            tokens,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(PlatformConfig::from_env(), crate::auth::token_source_from_env())
    }

    fn jobs_url(&self, request: &CreateJobRequest) -> String {
        format!(
            "{}/v1/{}/pipelineJobs?pipelineJobId={}",
            self.config.endpoint_for(&request.region),
            request.parent(),
            request.job_id
        )
    }

    fn job_url(&self, name: &str) -> Result<String> {
        let region = region_of(name)
            .ok_or_else(|| AlignmentError::InvalidJobId(format!("not a job resource name: {name}")))?;
        Ok(format!("{}/v1/{}", self.config.endpoint_for(region), name))
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(AlignmentError::Platform {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PipelineService for VertexPipelineService {
    async fn create_job(&self, request: &CreateJobRequest) -> Result<JobHandle> {
        validate_job_id(&request.job_id)?;
        let url = self.jobs_url(request);
        debug!("POST {}", url);

        let token = self.tokens.access_token().await?;
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&request.body())
            .send()
            .await?;

        let job: JobHandle = Self::parse_response(response).await?;
        info!("Pipeline job created: {}", job.name);
        Ok(job)
    }

    async fn get_job(&self, name: &str) -> Result<JobHandle> {
        let url = self.job_url(name)?;
        debug!("GET {}", url);

        let token = self.tokens.access_token().await?;
        let response = self.http_client.get(&url).bearer_auth(token).send().await?;
        Self::parse_response(response).await
    }

    async fn fetch_template(&self, uri: &str) -> Result<String> {
        debug!("Fetching template {}", uri);

        let token = self.tokens.access_token().await?;
        let response = self.http_client.get(uri).bearer_auth(token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(AlignmentError::Platform {
                status: status.as_u16(),
                message: body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use std::time::Duration;

    fn request() -> CreateJobRequest {
        let spec = PipelineSpec::from_value(json!({
            "pipelineInfo": {"name": "autosxs-template"},
            "schemaVersion": "2.1.0",
            "root": {"dag": {"tasks": {}}},
        }))
        .unwrap();

        let mut parameters = Map::new();
        parameters.insert("task".into(), json!("question_answering"));

        CreateJobRequest {
            project_id: "test-project".into(),
            region: "us-central1".into(),
            job_id: "human-alignment-check".into(),
            display_name: "human-alignment-check".into(),
            pipeline_spec: spec,
            pipeline_root: "gs://bkt/human-alignment-check".into(),
            parameters,
            labels: BTreeMap::new(),
        }
    }

    fn service() -> VertexPipelineService {
        let config = PlatformConfig {
            api_endpoint: None,
            request_timeout: Duration::from_secs(5),
        };
        VertexPipelineService::new(config, Box::new(StaticToken::new("t"))).unwrap()
    }

    #[test]
    fn test_job_id_validation() {
        assert!(validate_job_id("human-alignment-check").is_ok());
        assert!(validate_job_id("run2").is_ok());
        assert!(validate_job_id("Human").is_err());
        assert!(validate_job_id("2fast").is_err());
        assert!(validate_job_id("under_score").is_err());
        assert!(validate_job_id("").is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let body = request().body();
        assert_eq!(body["displayName"], "human-alignment-check");
        assert_eq!(body["pipelineSpec"]["pipelineInfo"]["name"], "autosxs-template");
        assert_eq!(
            body["runtimeConfig"]["gcsOutputDirectory"],
            "gs://bkt/human-alignment-check"
        );
        assert_eq!(
            body["runtimeConfig"]["parameterValues"]["task"],
            "question_answering"
        );
    }

    #[test]
    fn test_urls() {
        let svc = service();
        assert_eq!(
            svc.jobs_url(&request()),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/test-project/locations/us-central1/pipelineJobs?pipelineJobId=human-alignment-check"
        );
        assert_eq!(
            svc.job_url("projects/p/locations/europe-west4/pipelineJobs/j").unwrap(),
            "https://europe-west4-aiplatform.googleapis.com/v1/projects/p/locations/europe-west4/pipelineJobs/j"
        );
        assert!(svc.job_url("j").is_err());
    }

    #[test]
    fn test_region_of() {
        assert_eq!(
            region_of("projects/p/locations/us-east1/pipelineJobs/x"),
            Some("us-east1")
        );
        assert_eq!(region_of("pipelineJobs/x"), None);
    }
}
