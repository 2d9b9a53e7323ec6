//! In-memory fakes for the storage tool and pipeline service (testing only)
//!
//! Provides `RecordingStore` and `MemoryPipelineService`, which satisfy the
//! trait contracts without touching the network or spawning processes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::AlignmentError;
use crate::job::{JobHandle, JobState};
use crate::platform::{CreateJobRequest, PipelineService};
use crate::storage::{BucketStatus, ObjectStore};
use crate::Result;

// ---------------------------------------------------------------------------
// RecordingStore
// ---------------------------------------------------------------------------

/// A storage call as issued by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    MakeBucket {
        bucket: String,
        project_id: String,
        region: String,
    },
    CopyTo {
        local: PathBuf,
        remote: String,
    },
    Read(String),
    RemoveRecursive(String),
}

/// Object store that records every call and keeps objects in a `HashMap<uri, bytes>`.
#[derive(Debug, Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<StoreCall>>,
    buckets: Mutex<HashSet<String>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose uploads fail like a non-zero `gsutil cp`
    pub fn failing_uploads() -> Self {
        RecordingStore {
            fail_uploads: true,
            ..Self::default()
        }
    }

    /// Seed an object
    pub fn insert_object(&self, uri: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(uri.to_string(), bytes.to_vec());
    }

    pub fn object(&self, uri: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(uri).cloned()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn make_bucket(
        &self,
        bucket: &str,
        project_id: &str,
        region: &str,
    ) -> Result<BucketStatus> {
        self.record(StoreCall::MakeBucket {
            bucket: bucket.to_string(),
            project_id: project_id.to_string(),
            region: region.to_string(),
        });
        if self.buckets.lock().unwrap().insert(bucket.to_string()) {
            Ok(BucketStatus::Created)
        } else {
            Ok(BucketStatus::AlreadyExists)
        }
    }

    async fn copy_to(&self, local: &Path, remote: &str) -> Result<()> {
        self.record(StoreCall::CopyTo {
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        if self.fail_uploads {
            return Err(AlignmentError::CommandFailed {
                tool: "gsutil".to_string(),
                status: 1,
                stderr: "AccessDeniedException: 403".to_string(),
            });
        }
        let bytes = std::fs::read(local)?;
        self.objects
            .lock()
            .unwrap()
            .insert(remote.to_string(), bytes);
        Ok(())
    }

    async fn read(&self, remote: &str) -> Result<Vec<u8>> {
        self.record(StoreCall::Read(remote.to_string()));
        self.object(remote)
            .ok_or_else(|| AlignmentError::CommandFailed {
                tool: "gsutil".to_string(),
                status: 1,
                stderr: format!("CommandException: No URLs matched: {remote}"),
            })
    }

    async fn remove_recursive(&self, remote: &str) -> Result<()> {
        self.record(StoreCall::RemoveRecursive(remote.to_string()));
        self.objects
            .lock()
            .unwrap()
            .retain(|uri, _| !uri.starts_with(remote));
        self.buckets.lock().unwrap().remove(remote);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryPipelineService
// ---------------------------------------------------------------------------

/// Pipeline service backed by a `HashMap<resource name, JobHandle>`.
///
/// Each `get_job` advances a job through its scripted states, if any.
#[derive(Debug, Default)]
pub struct MemoryPipelineService {
    jobs: Mutex<HashMap<String, JobHandle>>,
    scripts: Mutex<HashMap<String, VecDeque<JobState>>>,
    requests: Mutex<Vec<CreateJobRequest>>,
    templates: Mutex<HashMap<String, String>>,
}

impl MemoryPipelineService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` for `fetch_template(uri)`
    pub fn with_template(self, uri: &str, text: &str) -> Self {
        self.templates
            .lock()
            .unwrap()
            .insert(uri.to_string(), text.to_string());
        self
    }

    /// Store a job as-is
    pub fn insert_job(&self, job: JobHandle) {
        self.jobs.lock().unwrap().insert(job.name.clone(), job);
    }

    /// States the job named `name` moves through on successive reads
    pub fn script_states(&self, name: &str, states: &[JobState]) {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), states.iter().copied().collect());
    }

    pub fn requests(&self) -> Vec<CreateJobRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineService for MemoryPipelineService {
    async fn create_job(&self, request: &CreateJobRequest) -> Result<JobHandle> {
        let name = format!("{}/pipelineJobs/{}", request.parent(), request.job_id);

        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&name) {
            return Err(AlignmentError::Platform {
                status: 409,
                message: format!("PipelineJob {} already exists", request.job_id),
            });
        }

        let job = JobHandle {
            name: name.clone(),
            display_name: request.display_name.clone(),
            state: JobState::Pending,
            create_time: Some(Utc::now()),
            ..JobHandle::default()
        };
        jobs.insert(name, job.clone());
        self.requests.lock().unwrap().push(request.clone());
        Ok(job)
    }

    async fn get_job(&self, name: &str) -> Result<JobHandle> {
        let next_state = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(VecDeque::pop_front);

        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(name).ok_or_else(|| AlignmentError::Platform {
            status: 404,
            message: format!("PipelineJob {name} not found"),
        })?;
        if let Some(state) = next_state {
            job.state = state;
            if state.is_terminal() {
                job.end_time = Some(Utc::now());
            }
        }
        Ok(job.clone())
    }

    async fn fetch_template(&self, uri: &str) -> Result<String> {
        self.templates
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .ok_or_else(|| AlignmentError::Platform {
                status: 404,
                message: format!("template {uri} not found"),
            })
    }
}
