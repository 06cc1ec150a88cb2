use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;

use insights_core::types::{Job, JobStatus};

/// Bounded in-memory job history. When full, registering a new job evicts
/// the numerically smallest job id.
pub struct JobRegistry {
    capacity: usize,
    jobs: Mutex<BTreeMap<u64, Job>>,
}

impl JobRegistry {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), jobs: Mutex::new(BTreeMap::new()) }
    }

    /// Record a new job as `IN_PROGRESS` and return its record.
    pub fn register(&self, job_id: u64, name: &str) -> Job {
        let job = Job { job_id, name: name.to_string(), status: JobStatus::InProgress, data: None };
        let mut jobs = self.jobs.lock();
        while jobs.len() >= self.capacity && !jobs.contains_key(&job_id) {
            if let Some((evicted, _)) = jobs.pop_first() {
                tracing::debug!(job_id = evicted, "job evicted");
            }
        }
        jobs.insert(job_id, job.clone());
        job
    }

    pub fn get(&self, job_id: u64) -> Option<Job> {
        self.jobs.lock().get(&job_id).cloned()
    }

    /// Set status and payload. Unknown ids are ignored.
    pub fn update(&self, job_id: u64, status: JobStatus, data: Option<Value>) {
        match self.jobs.lock().get_mut(&job_id) {
            Some(job) => {
                job.status = status;
                job.data = data;
            }
            None => tracing::warn!(job_id, "update for unknown job ignored"),
        }
    }

    /// Remove one job, or every job when `job_id` is `None`.
    pub fn remove(&self, job_id: Option<u64>) {
        let mut jobs = self.jobs.lock();
        match job_id {
            Some(id) => {
                jobs.remove(&id);
            }
            None => jobs.clear(),
        }
    }

    pub fn list(&self) -> Vec<Job> {
        self.jobs.lock().values().cloned().collect()
    }
}
