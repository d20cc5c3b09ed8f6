//! Transcode jobs and their in-memory status table.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reelhouse_common::JobId;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Finished jobs kept for inspection before the oldest are dropped.
pub const JOB_HISTORY_LIMIT: usize = 1024;

/// A request to produce quality variants for one input file.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub id: JobId,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Quality names in the order they will be encoded.
    pub qualities: Vec<String>,
}

impl TranscodeJob {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, qualities: Vec<String>) -> Self {
        Self {
            id: JobId::new(),
            input: input.into(),
            output_dir: output_dir.into(),
            qualities,
        }
    }
}

/// Lifecycle of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running { quality: String },
    Completed,
    Failed {
        quality: Option<String>,
        error: String,
    },
    Cancelled,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed { .. } | JobStatus::Cancelled
        )
    }
}

/// Snapshot of a job as exposed over the API.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub input: PathBuf,
    pub qualities: Vec<String>,
    pub status: JobStatus,
    /// Variants this job encoded.
    pub produced: Vec<String>,
    /// Variants that already existed or were not in the catalog.
    pub skipped: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    fn queued(job: &TranscodeJob) -> Self {
        let now = Utc::now();
        Self {
            id: job.id,
            input: job.input.clone(),
            qualities: job.qualities.clone(),
            status: JobStatus::Queued,
            produced: Vec::new(),
            skipped: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Thread-safe table of job records.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a job as queued.
    pub fn insert(&self, job: &TranscodeJob) {
        let mut jobs = self.jobs.write();
        jobs.insert(job.id, JobRecord::queued(job));
        Self::prune(&mut jobs);
    }

    /// Apply `f` to a job's record and bump its update time.
    pub fn update<F>(&self, id: JobId, f: F)
    where
        F: FnOnce(&mut JobRecord),
    {
        if let Some(record) = self.jobs.write().get_mut(&id) {
            f(record);
            record.updated_at = Utc::now();
        }
    }

    pub fn set_status(&self, id: JobId, status: JobStatus) {
        self.update(id, |r| r.status = status);
    }

    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.read().get(&id).cloned()
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut all: Vec<JobRecord> = self.jobs.read().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    fn prune(jobs: &mut HashMap<JobId, JobRecord>) {
        if jobs.len() <= JOB_HISTORY_LIMIT {
            return;
        }

        let mut finished: Vec<(DateTime<Utc>, JobId)> = jobs
            .values()
            .filter(|r| r.status.is_finished())
            .map(|r| (r.updated_at, r.id))
            .collect();
        finished.sort_by_key(|(updated, _)| *updated);

        let excess = jobs.len() - JOB_HISTORY_LIMIT;
        for (_, id) in finished.into_iter().take(excess) {
            jobs.remove(&id);
        }
    }
}
