//! Alignment session
//!
//! A [`Session`] binds a project, region and bucket to a storage tool and a
//! pipeline service, and runs each lifecycle step against them:
//!
//! ```text
//! ensure_storage -> stage_dataset -> compile_template -> submit_job
//!     -> wait_for_completion -> fetch_task_output / load_metrics -> teardown
//! ```
//!
//! Steps are independent calls; the only state carried between them is the
//! URI of the staged dataset.

use crate::config::SessionConfig;
use crate::dataset::{EvaluationColumns, EvaluationDataset, StagedDataset, DATASET_OBJECT_PATH};
use crate::error::AlignmentError;
use crate::job::{JobHandle, JobState, TaskOutputs};
use crate::metrics::MetricsTable;
use crate::platform::{validate_job_id, CreateJobRequest, PipelineService};
use crate::storage::{BucketStatus, ObjectStore};
use crate::template::{write_template, PipelineDefinition, PipelineSpec};
use crate::Result;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Orchestrates one alignment run
pub struct Session<S, P> {
    config: SessionConfig,
    store: S,
    platform: P,
    work_dir: PathBuf,
    staged: Option<StagedDataset>,
}

impl<S: ObjectStore, P: PipelineService> Session<S, P> {
    /// Create a session writing local files to the current directory
    pub fn new(config: SessionConfig, store: S, platform: P) -> Self {
        Session {
            config,
            store,
            platform,
            work_dir: PathBuf::from("."),
            staged: None,
        }
    }

    /// Write local artifacts (the serialized dataset) under `dir`
    pub fn with_work_dir(mut self, dir: &Path) -> Self {
        self.work_dir = dir.to_path_buf();
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Remote URI of the dataset staged by [`Session::stage_dataset`]
    pub fn dataset_uri(&self) -> Option<&str> {
        self.staged.as_ref().map(|s| s.remote_uri.as_str())
    }

    /// Create the session bucket. An existing bucket is reused.
    pub async fn ensure_storage(&self) -> Result<BucketStatus> {
        self.store
            .make_bucket(
                self.config.bucket(),
                self.config.project_id(),
                self.config.region(),
            )
            .await
    }

    /// Build the dataset from parallel columns, write it locally and upload it.
    pub async fn stage_dataset(&mut self, columns: EvaluationColumns) -> Result<StagedDataset> {
        let dataset = EvaluationDataset::from_columns(columns)?;
        let file = dataset.write_to_dir(&self.work_dir)?;
        let remote_uri = self.config.object_uri(DATASET_OBJECT_PATH);

        self.store.copy_to(&file.path, &remote_uri).await?;

        let staged = StagedDataset {
            local_path: file.path,
            remote_uri,
            digest: file.digest,
            record_count: file.record_count,
        };
        info!(
            records = staged.record_count,
            digest = %staged.short_digest(),
            "Dataset uploaded to: {}",
            staged.remote_uri
        );

        self.staged = Some(staged.clone());
        Ok(staged)
    }

    /// Materialize `definition` as a YAML template at `output_path`.
    pub async fn compile_template(
        &self,
        definition: &PipelineDefinition,
        output_path: &Path,
    ) -> Result<PipelineSpec> {
        let spec = match definition {
            PipelineDefinition::Inline(spec) => spec.clone(),
            PipelineDefinition::Published(uri) => {
                let text = self.platform.fetch_template(uri).await?;
                PipelineSpec::from_yaml_str(&text)?
            }
        };

        write_template(&spec, output_path)?;
        Ok(spec)
    }

    /// Submit the template at `template_path` as job `name` with caching disabled.
    ///
    /// Returns as soon as the platform accepts the job.
    pub async fn submit_job(
        &self,
        parameters: Map<String, Value>,
        name: &str,
        template_path: &Path,
    ) -> Result<JobHandle> {
        validate_job_id(name)?;

        let mut spec = PipelineSpec::load(template_path)?;
        spec.disable_caching();

        let mut labels = BTreeMap::new();
        if let Some(staged) = &self.staged {
            labels.insert("dataset-digest".to_string(), staged.short_digest().to_string());
        }

        let request = CreateJobRequest {
            project_id: self.config.project_id().to_string(),
            region: self.config.region().to_string(),
            job_id: name.to_string(),
            display_name: name.to_string(),
            pipeline_spec: spec,
            pipeline_root: self.config.object_uri(name),
            parameters,
            labels,
        };

        let job = self.platform.create_job(&request).await?;
        info!("Pipeline {} initiated.", name);
        Ok(job)
    }

    /// Re-read `job` from the platform.
    pub async fn refresh_job(&self, job: &JobHandle) -> Result<JobHandle> {
        self.platform.get_job(&job.name).await
    }

    /// Poll until `job` reaches a terminal state.
    ///
    /// Fails with `JobFailed` unless the job succeeded and with `Timeout`
    /// once `timeout` has elapsed.
    pub async fn wait_for_completion(
        &self,
        job: &JobHandle,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<JobHandle> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut current = job.clone();

        while !current.state.is_terminal() {
            if tokio::time::Instant::now() >= deadline {
                return Err(AlignmentError::Timeout {
                    job: current.job_id().to_string(),
                    secs: timeout.as_secs(),
                });
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            tokio::time::sleep(poll_interval.min(remaining)).await;
            current = self.refresh_job(&current).await?;
            debug!("Job {} is {}", current.job_id(), current.state);
        }

        if current.state == JobState::Succeeded {
            info!("Pipeline job {} succeeded", current.job_id());
            Ok(current)
        } else {
            if let Some(err) = &current.error {
                warn!("Pipeline job {} error: {}", current.job_id(), err.message);
            }
            Err(AlignmentError::JobFailed {
                job: current.job_id().to_string(),
                state: current.state.to_string(),
            })
        }
    }

    /// Output mapping of `task_name` within `job`, or `None` if no such task.
    pub fn fetch_task_output<'a>(
        &self,
        job: &'a JobHandle,
        task_name: &str,
    ) -> Option<&'a TaskOutputs> {
        job.task_outputs(task_name)
    }

    /// Load a JSON Lines table from a `gs://` URI or a local path.
    pub async fn load_metrics(&self, uri: &str) -> Result<MetricsTable> {
        let bytes = if uri.starts_with("gs://") {
            self.store.read(uri).await?
        } else {
            tokio::fs::read(uri).await?
        };
        let text = String::from_utf8(bytes)
            .map_err(|e| AlignmentError::InvalidMetrics(format!("{uri}: {e}")))?;
        MetricsTable::from_jsonl(&text)
    }

    /// Delete the session bucket when `delete_storage` is set.
    ///
    /// Returns whether a deletion was issued.
    pub async fn teardown(&self, delete_storage: bool) -> Result<bool> {
        if !delete_storage {
            debug!("Keeping bucket {}", self.config.bucket());
            return Ok(false);
        }

        self.store.remove_recursive(self.config.bucket()).await?;
        info!("Bucket {} deleted.", self.config.bucket());
        Ok(true)
    }
}
