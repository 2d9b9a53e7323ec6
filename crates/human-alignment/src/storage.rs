//! Cloud Storage access
//!
//! Storage operations go through the `gsutil` command-line tool. The
//! [`ObjectStore`] trait is the seam the session is written against so tests
//! can swap in [`crate::fakes::RecordingStore`].

use crate::command::{is_tool_available, run_checked, run_tool, CommandOutput};
use crate::error::AlignmentError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of a bucket creation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketStatus {
    Created,
    AlreadyExists,
}

/// Object storage operations needed by a session
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create `bucket` in `region` under `project_id`.
    async fn make_bucket(
        &self,
        bucket: &str,
        project_id: &str,
        region: &str,
    ) -> Result<BucketStatus>;

    /// Upload a local file to a `gs://` URI.
    async fn copy_to(&self, local: &Path, remote: &str) -> Result<()>;

    /// Read the full contents of a `gs://` object.
    async fn read(&self, remote: &str) -> Result<Vec<u8>>;

    /// Recursively delete everything under a `gs://` URI, including the bucket itself
    /// when given a bucket root.
    async fn remove_recursive(&self, remote: &str) -> Result<()>;
}

/// `gsutil`-backed object store
#[derive(Debug, Clone)]
pub struct GsutilStore {
    binary: String,
}

impl Default for GsutilStore {
    fn default() -> Self {
        GsutilStore {
            binary: std::env::var("GSUTIL_BIN").unwrap_or_else(|_| "gsutil".to_string()),
        }
    }
}

impl GsutilStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `gsutil` executable
    pub fn with_binary(binary: &str) -> Self {
        GsutilStore {
            binary: binary.to_string(),
        }
    }

    /// Check whether the configured `gsutil` is installed
    pub async fn is_available(&self) -> bool {
        is_tool_available(&self.binary).await
    }
}

/// `gsutil mb` reports an existing bucket on a `ServiceException: 409` line.
///
/// Only the exception line is inspected: the preceding `Creating gs://...`
/// progress line carries the bucket name, which may itself contain "409".
fn is_already_exists(stderr: &str) -> bool {
    stderr.lines().map(str::trim).any(|line| {
        line.starts_with("ServiceException: 409")
            && (line.contains("already exists") || line.contains("already own"))
    })
}

/// Classify the outcome of `gsutil mb`.
fn bucket_status(tool: &str, bucket: &str, output: CommandOutput) -> Result<BucketStatus> {
    if output.success() {
        info!("Bucket created: {}", bucket);
        Ok(BucketStatus::Created)
    } else if is_already_exists(&output.stderr) {
        warn!("Bucket {} already exists, reusing it", bucket);
        Ok(BucketStatus::AlreadyExists)
    } else {
        Err(AlignmentError::CommandFailed {
            tool: tool.to_string(),
            status: output.status,
            stderr: output.stderr,
        })
    }
}

#[async_trait]
impl ObjectStore for GsutilStore {
    async fn make_bucket(
        &self,
        bucket: &str,
        project_id: &str,
        region: &str,
    ) -> Result<BucketStatus> {
        let args = ["mb", "-l", region, "-p", project_id, bucket];
        let output = run_tool(&self.binary, &args).await?;
        bucket_status(&self.binary, bucket, output)
    }

    async fn copy_to(&self, local: &Path, remote: &str) -> Result<()> {
        let local = local.to_string_lossy().to_string();
        run_checked(&self.binary, &["cp", local.as_str(), remote]).await?;
        debug!("Copied {} to {}", local, remote);
        Ok(())
    }

    async fn read(&self, remote: &str) -> Result<Vec<u8>> {
        let output = run_checked(&self.binary, &["cat", remote]).await?;
        Ok(output.stdout)
    }

    async fn remove_recursive(&self, remote: &str) -> Result<()> {
        run_checked(&self.binary, &["rm", "-r", remote]).await?;
        info!("Removed {}", remote);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mb_output(status: i32, stderr: &str) -> CommandOutput {
        CommandOutput {
            status,
            stdout: Vec::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_already_exists_detection() {
        assert!(is_already_exists(
            "Creating gs://bkt/...\nServiceException: 409 A Cloud Storage bucket named 'bkt' already exists."
        ));
        assert!(is_already_exists(
            "Creating gs://bkt/...\nServiceException: 409 You already own this bucket. Please select another name."
        ));
        assert!(!is_already_exists("AccessDeniedException: 403 caller lacks permission"));
    }

    #[test]
    fn test_bucket_name_containing_409_does_not_mask_failure() {
        let bucket = "gs://test-project-aip-k409x2ab";
        let stderr = "Creating gs://test-project-aip-k409x2ab/...\n\
                      AccessDeniedException: 403 caller does not have storage.buckets.create access";
        assert!(!is_already_exists(stderr));

        let err = bucket_status("gsutil", bucket, mb_output(1, stderr)).unwrap_err();
        match err {
            AlignmentError::CommandFailed { status, stderr, .. } => {
                assert_eq!(status, 1);
                assert!(stderr.contains("403"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bucket_status_outcomes() {
        let bucket = "gs://bkt";
        assert_eq!(
            bucket_status("gsutil", bucket, mb_output(0, "Creating gs://bkt/...")).unwrap(),
            BucketStatus::Created
        );
        assert_eq!(
            bucket_status(
                "gsutil",
                bucket,
                mb_output(
                    1,
                    "Creating gs://bkt/...\nServiceException: 409 A Cloud Storage bucket named 'bkt' already exists."
                )
            )
            .unwrap(),
            BucketStatus::AlreadyExists
        );
        // A name held by someone else is not ours to reuse
        assert!(bucket_status(
            "gsutil",
            bucket,
            mb_output(
                1,
                "Creating gs://bkt/...\nServiceException: 409 The requested bucket name is not available."
            )
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_surfaces_tool_not_found() {
        let store = GsutilStore::with_binary("no-such-gsutil-9f2a");
        assert!(!store.is_available().await);

        let err = store
            .make_bucket("gs://bkt", "project", "us-central1")
            .await
            .unwrap_err();
        assert!(matches!(err, AlignmentError::ToolNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_upload_is_an_error() {
        // `false` ignores its arguments and exits 1
        let store = GsutilStore::with_binary("false");
        let err = store
            .copy_to(Path::new("data.json"), "gs://bkt/input/data.json")
            .await
            .unwrap_err();
        assert!(matches!(err, AlignmentError::CommandFailed { status: 1, .. }));
    }
}
