//! Pipeline job handles
//!
//! Mirrors the subset of the Vertex AI `PipelineJob` resource this crate
//! reads: identity, state and the per-task output artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pipeline execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobState {
    #[serde(rename = "PIPELINE_STATE_QUEUED")]
    Queued,
    #[serde(rename = "PIPELINE_STATE_PENDING")]
    Pending,
    #[serde(rename = "PIPELINE_STATE_RUNNING")]
    Running,
    #[serde(rename = "PIPELINE_STATE_SUCCEEDED")]
    Succeeded,
    #[serde(rename = "PIPELINE_STATE_FAILED")]
    Failed,
    #[serde(rename = "PIPELINE_STATE_CANCELLING")]
    Cancelling,
    #[serde(rename = "PIPELINE_STATE_CANCELLED")]
    Cancelled,
    #[serde(rename = "PIPELINE_STATE_PAUSED")]
    Paused,
    #[default]
    #[serde(rename = "PIPELINE_STATE_UNSPECIFIED", other)]
    Unspecified,
}

impl JobState {
    /// Whether the job can no longer change state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Queued => "QUEUED",
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
            JobState::Cancelling => "CANCELLING",
            JobState::Cancelled => "CANCELLED",
            JobState::Paused => "PAUSED",
            JobState::Unspecified => "UNSPECIFIED",
        };
        write!(f, "{}", s)
    }
}

/// An output artifact of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Artifact {
    pub name: String,
    pub display_name: Option<String>,
    pub uri: Option<String>,
    pub metadata: serde_json::Value,
}

/// Artifacts produced under one output name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ArtifactList {
    pub artifacts: Vec<Artifact>,
}

/// Output name -> artifacts
pub type TaskOutputs = BTreeMap<String, ArtifactList>;

/// One task of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskDetail {
    pub task_id: Option<String>,
    pub task_name: String,
    pub state: Option<String>,
    pub outputs: TaskOutputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct JobDetail {
    pub task_details: Vec<TaskDetail>,
}

/// Error status reported by the platform for a failed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct JobError {
    pub code: i32,
    pub message: String,
}

/// Reference to a submitted pipeline job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct JobHandle {
    /// Full resource name, `projects/<p>/locations/<r>/pipelineJobs/<id>`
    pub name: String,
    pub display_name: String,
    pub state: JobState,
    pub create_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<JobError>,
    pub job_detail: Option<JobDetail>,
}

impl JobHandle {
    /// Trailing id segment of the resource name
    pub fn job_id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Task details, empty until the platform starts reporting them
    pub fn tasks(&self) -> &[TaskDetail] {
        self.job_detail
            .as_ref()
            .map(|d| d.task_details.as_slice())
            .unwrap_or_default()
    }

    /// Output mapping of the task called `task_name`, if any.
    pub fn task_outputs(&self, task_name: &str) -> Option<&TaskOutputs> {
        self.tasks()
            .iter()
            .find(|t| t.task_name == task_name)
            .map(|t| &t.outputs)
    }
}
