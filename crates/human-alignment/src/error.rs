//! Error types for human-alignment

use thiserror::Error;

/// Errors that can occur while orchestrating an alignment run
#[derive(Error, Debug)]
pub enum AlignmentError {
    /// Storage location is not a well-formed `gs://` bucket
    #[error("Invalid storage location: {0}")]
    InvalidBucket(String),

    /// Pipeline job id does not satisfy the platform's naming rules
    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    /// Dataset columns have different lengths
    #[error("Column '{column}' has {actual} values, expected {expected}")]
    ColumnLengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Dataset has no records
    #[error("Evaluation dataset is empty")]
    EmptyDataset,

    /// Metrics file is not valid UTF-8 text
    #[error("Invalid metrics file: {0}")]
    InvalidMetrics(String),

    /// External tool is not installed or not in PATH
    #[error("{0} is not installed or not in PATH")]
    ToolNotFound(String),

    /// External tool exited with a non-zero status
    #[error("{tool} failed with status {status}: {stderr}")]
    CommandFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    /// Pipeline template is malformed
    #[error("Invalid pipeline template: {0}")]
    InvalidTemplate(String),

    /// Platform API returned an error response
    #[error("Platform API error ({status}): {message}")]
    Platform { status: u16, message: String },

    /// Access token could not be obtained
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Job reached a terminal state other than success
    #[error("Pipeline job {job} finished in state {state}")]
    JobFailed { job: String, state: String },

    /// Job did not finish before the deadline
    #[error("Timed out after {secs}s waiting for pipeline job {job}")]
    Timeout { job: String, secs: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for AlignmentError {
    fn from(err: reqwest::Error) -> Self {
        AlignmentError::Http(err.to_string())
    }
}
