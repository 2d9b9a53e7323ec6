//! Human Alignment: AutoSxS orchestration on Vertex AI Pipelines
//!
//! Stages an evaluation dataset with human preference labels, launches the
//! AutoSxS pipeline and reads its outputs back.
//!
//! ## Key Components
//!
//! - `Session`: runs each lifecycle step for one project/region/bucket
//! - `ObjectStore` / `GsutilStore`: bucket and object operations via `gsutil`
//! - `PipelineService` / `VertexPipelineService`: the `pipelineJobs` REST API
//! - `EvaluationDataset`: JSON Lines dataset built from parallel columns
//! - `PipelineSpec`: compiled pipeline template

pub mod auth;
pub mod command;
pub mod config;
pub mod dataset;
mod error;
pub mod fakes;
pub mod job;
pub mod metrics;
pub mod params;
pub mod platform;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod template;

pub use auth::{token_source_from_env, GcloudToken, StaticToken, TokenSource};
pub use config::{generate_token, PlatformConfig, SessionConfig, DEFAULT_REGION};
pub use dataset::{EvaluationColumns, EvaluationDataset, EvaluationRecord, StagedDataset};
pub use error::AlignmentError;
pub use job::{Artifact, ArtifactList, JobHandle, JobState, TaskDetail, TaskOutputs};
pub use metrics::MetricsTable;
pub use params::AutoSxsParameters;
pub use platform::{CreateJobRequest, PipelineService, VertexPipelineService};
pub use session::Session;
pub use storage::{BucketStatus, GsutilStore, ObjectStore};
pub use telemetry::init_tracing;
pub use template::{PipelineDefinition, PipelineSpec, AUTOSXS_TEMPLATE_URI, DEFAULT_TEMPLATE_PATH};

/// Result type for human-alignment operations
pub type Result<T> = std::result::Result<T, AlignmentError>;
