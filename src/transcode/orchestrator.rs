//! Background transcode orchestrator.
//!
//! Jobs go into a bounded queue drained by a fixed pool of workers. Each
//! job walks its quality list in order, skips variants that already exist,
//! and stops at the first encoder failure. A keyed lock per output path
//! keeps two jobs from encoding the same variant at once.

use dashmap::DashMap;
use reelhouse_av::{EncodeRequest, Encoder};
use reelhouse_common::paths::variant_path;
use reelhouse_common::{quality, Error, JobId, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::job::{JobStatus, JobTable, TranscodeJob};

/// Tunables for the worker pool.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 32,
        }
    }
}

/// State shared between the orchestrator handle and its workers.
struct Shared {
    encoder: Arc<dyn Encoder>,
    jobs: JobTable,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
    cancel: CancellationToken,
}

impl Shared {
    fn lock_for(&self, output: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(output.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_lock(&self, output: &Path, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(output, |_, l| Arc::strong_count(l) == 1);
    }

    /// Run one job to completion and return its final status.
    async fn execute(&self, job: &TranscodeJob) -> JobStatus {
        let status = self.encode_all(job).await;
        self.jobs.set_status(job.id, status.clone());

        match &status {
            JobStatus::Completed => {
                tracing::info!(job_id = %job.id, input = %job.input.display(), "Transcode job completed");
            }
            JobStatus::Failed { quality, error } => {
                tracing::error!(
                    job_id = %job.id,
                    quality = quality.as_deref().unwrap_or("-"),
                    "Transcode job failed: {error}"
                );
            }
            JobStatus::Cancelled => {
                tracing::info!(job_id = %job.id, "Transcode job cancelled");
            }
            _ => {}
        }

        status
    }

    async fn encode_all(&self, job: &TranscodeJob) -> JobStatus {
        if let Err(e) = tokio::fs::create_dir_all(&job.output_dir).await {
            return JobStatus::Failed {
                quality: None,
                error: format!("cannot create {}: {e}", job.output_dir.display()),
            };
        }

        for name in &job.qualities {
            if self.cancel.is_cancelled() {
                return JobStatus::Cancelled;
            }

            let preset = match quality::lookup(name) {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!(job_id = %job.id, "Skipping quality: {e}");
                    self.jobs.update(job.id, |r| r.skipped.push(name.clone()));
                    continue;
                }
            };

            let output = variant_path(&job.output_dir, &job.input, name);
            let lock = self.lock_for(&output);
            let result = {
                let _guard = lock.lock().await;
                self.encode_one(job, preset, &output).await
            };
            self.release_lock(&output, lock);

            match result {
                Ok(true) => self.jobs.update(job.id, |r| r.produced.push(name.clone())),
                Ok(false) => self.jobs.update(job.id, |r| r.skipped.push(name.clone())),
                Err(Error::EncoderCancelled { .. }) => return JobStatus::Cancelled,
                Err(e) => {
                    return JobStatus::Failed {
                        quality: Some(name.clone()),
                        error: e.to_string(),
                    };
                }
            }
        }

        JobStatus::Completed
    }

    /// Encode one variant unless it already exists. Caller holds the lock.
    ///
    /// Returns whether an encode actually ran.
    async fn encode_one(
        &self,
        job: &TranscodeJob,
        preset: &quality::Quality,
        output: &Path,
    ) -> Result<bool> {
        if tokio::fs::try_exists(output).await.unwrap_or(false) {
            tracing::debug!(job_id = %job.id, "Variant {} already exists", output.display());
            return Ok(false);
        }

        self.jobs.set_status(
            job.id,
            JobStatus::Running {
                quality: preset.name.to_string(),
            },
        );
        tracing::info!(job_id = %job.id, quality = preset.name, "Transcoding {}", job.input.display());

        let request = EncodeRequest {
            input: &job.input,
            output,
            quality: preset,
        };
        self.encoder.encode(&request, &self.cancel).await?;

        tracing::info!(job_id = %job.id, quality = preset.name, "Produced {}", output.display());
        Ok(true)
    }
}

/// Owns the job queue and the worker pool.
pub struct TranscodeOrchestrator {
    shared: Arc<Shared>,
    queue: mpsc::Sender<TranscodeJob>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl TranscodeOrchestrator {
    /// Spawn the worker pool. Must be called inside a Tokio runtime.
    ///
    /// Workers stop when `cancel` fires; any encode in flight is killed.
    pub fn start(
        encoder: Arc<dyn Encoder>,
        options: OrchestratorOptions,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let shared = Arc::new(Shared {
            encoder,
            jobs: JobTable::new(),
            locks: DashMap::new(),
            cancel,
        });

        let workers = (0..options.workers.max(1))
            .map(|n| tokio::spawn(run_worker(n, Arc::clone(&shared), Arc::clone(&rx))))
            .collect();

        tracing::info!(
            workers = options.workers.max(1),
            queue_capacity = options.queue_capacity.max(1),
            "Transcode workers started"
        );

        Self {
            shared,
            queue: tx,
            workers: parking_lot::Mutex::new(workers),
        }
    }

    /// Queue a job without waiting for it. Fails when the queue is full or
    /// the orchestrator is shutting down.
    pub fn submit(
        &self,
        input: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        qualities: Vec<String>,
    ) -> Result<JobId> {
        if self.shared.cancel.is_cancelled() {
            return Err(Error::internal("transcoder is shutting down"));
        }

        let job = TranscodeJob::new(input, output_dir, qualities);
        let id = job.id;
        self.shared.jobs.insert(&job);

        match self.queue.try_send(job) {
            Ok(()) => {
                tracing::debug!(job_id = %id, "Transcode job queued");
                Ok(id)
            }
            Err(e) => {
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "transcode queue is full",
                    mpsc::error::TrySendError::Closed(_) => "transcode queue is closed",
                };
                self.shared.jobs.set_status(
                    id,
                    JobStatus::Failed {
                        quality: None,
                        error: reason.to_string(),
                    },
                );
                Err(Error::internal(reason))
            }
        }
    }

    /// Run a job on the caller's task, bypassing the queue.
    pub async fn run_job(
        &self,
        input: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        qualities: Vec<String>,
    ) -> (JobId, JobStatus) {
        let job = TranscodeJob::new(input, output_dir, qualities);
        self.shared.jobs.insert(&job);
        let status = self.shared.execute(&job).await;
        (job.id, status)
    }

    pub fn jobs(&self) -> &JobTable {
        &self.shared.jobs
    }

    /// Cancel running encodes and wait for every worker to exit.
    pub async fn shutdown(&self) {
        self.shared.cancel.cancel();
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!("Transcode worker panicked: {e}");
            }
        }
        tracing::info!("Transcode workers stopped");
    }
}

async fn run_worker(
    n: usize,
    shared: Arc<Shared>,
    queue: Arc<Mutex<mpsc::Receiver<TranscodeJob>>>,
) {
    tracing::debug!(worker = n, "Transcode worker started");

    loop {
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                job = rx.recv() => job,
                _ = shared.cancel.cancelled() => None,
            }
        };

        let Some(job) = next else {
            break;
        };

        if shared.cancel.is_cancelled() {
            shared.jobs.set_status(job.id, JobStatus::Cancelled);
            break;
        }

        shared.execute(&job).await;
    }

    if shared.cancel.is_cancelled() {
        // Jobs still queued will never run.
        let mut rx = queue.lock().await;
        rx.close();
        while let Ok(job) = rx.try_recv() {
            tracing::debug!(job_id = %job.id, "Dropping queued transcode job");
            shared.jobs.set_status(job.id, JobStatus::Cancelled);
        }
    }

    tracing::debug!(worker = n, "Transcode worker stopped");
}

/// Qualities from `requested` whose variant of `original` exists in
/// `output_dir`, in the order requested.
pub async fn available_qualities<S: AsRef<str>>(
    output_dir: &Path,
    original: &Path,
    requested: &[S],
) -> Vec<String> {
    let mut found = Vec::new();
    for name in requested {
        let name = name.as_ref();
        let path = variant_path(output_dir, original, name);
        if tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            found.push(name.to_string());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelhouse_common::quality::DEFAULT_LADDER;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ladder() -> Vec<String> {
        DEFAULT_LADDER.iter().map(|q| q.to_string()).collect()
    }

    /// Writes a small file for every request, except for qualities listed in
    /// `fail_on`.
    #[derive(Default)]
    struct FakeEncoder {
        calls: AtomicUsize,
        fail_on: HashSet<&'static str>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Encoder for FakeEncoder {
        async fn encode(
            &self,
            request: &EncodeRequest<'_>,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_on.contains(request.quality.name) {
                return Err(Error::EncoderExit {
                    quality: request.quality.name.to_string(),
                    status: "exit status: 1".into(),
                    stderr: "boom".into(),
                });
            }
            tokio::fs::write(request.output, request.quality.name).await?;
            Ok(())
        }
    }

    /// Blocks until cancelled.
    struct HangingEncoder;

    #[async_trait]
    impl Encoder for HangingEncoder {
        async fn encode(
            &self,
            request: &EncodeRequest<'_>,
            cancel: &CancellationToken,
        ) -> Result<()> {
            cancel.cancelled().await;
            Err(Error::EncoderCancelled {
                quality: request.quality.name.to_string(),
            })
        }
    }

    fn setup() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("movie.mov");
        std::fs::write(&input, b"source").unwrap();
        (dir, input)
    }

    #[tokio::test]
    async fn full_ladder_then_idempotent_rerun() {
        let (dir, input) = setup();
        let encoder = Arc::new(FakeEncoder::default());
        let orch = TranscodeOrchestrator::start(
            encoder.clone(),
            OrchestratorOptions::default(),
            CancellationToken::new(),
        );

        let (_, status) = orch.run_job(&input, dir.path(), ladder()).await;
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            available_qualities(dir.path(), &input, &ladder()).await,
            ladder()
        );

        let (id, status) = orch.run_job(&input, dir.path(), ladder()).await;
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 4);
        assert_eq!(orch.jobs().get(id).unwrap().skipped, ladder());

        orch.shutdown().await;
    }

    #[tokio::test]
    async fn failure_stops_remaining_qualities() {
        let (dir, input) = setup();
        let encoder = Arc::new(FakeEncoder {
            fail_on: HashSet::from(["480p"]),
            ..Default::default()
        });
        let orch = TranscodeOrchestrator::start(
            encoder.clone(),
            OrchestratorOptions::default(),
            CancellationToken::new(),
        );

        let (id, status) = orch.run_job(&input, dir.path(), ladder()).await;
        assert!(matches!(
            status,
            JobStatus::Failed { quality: Some(ref q), .. } if q == "480p"
        ));
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            available_qualities(dir.path(), &input, &ladder()).await,
            vec!["1080p", "720p"]
        );
        assert_eq!(orch.jobs().get(id).unwrap().produced, vec!["1080p", "720p"]);

        orch.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_quality_is_skipped() {
        let (dir, input) = setup();
        let encoder = Arc::new(FakeEncoder::default());
        let orch = TranscodeOrchestrator::start(
            encoder.clone(),
            OrchestratorOptions::default(),
            CancellationToken::new(),
        );

        let qualities = vec!["8k".to_string(), "360p".to_string()];
        let (id, status) = orch.run_job(&input, dir.path(), qualities).await;
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);

        let record = orch.jobs().get(id).unwrap();
        assert_eq!(record.skipped, vec!["8k"]);
        assert_eq!(record.produced, vec!["360p"]);

        orch.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_jobs_encode_each_variant_once() {
        let (dir, input) = setup();
        let encoder = Arc::new(FakeEncoder {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let orch = Arc::new(TranscodeOrchestrator::start(
            encoder.clone(),
            OrchestratorOptions::default(),
            CancellationToken::new(),
        ));

        let a = {
            let orch = Arc::clone(&orch);
            let input = input.clone();
            let out = dir.path().to_path_buf();
            tokio::spawn(async move { orch.run_job(input, out, ladder()).await })
        };
        let b = {
            let orch = Arc::clone(&orch);
            let input = input.clone();
            let out = dir.path().to_path_buf();
            tokio::spawn(async move { orch.run_job(input, out, ladder()).await })
        };

        assert_eq!(a.await.unwrap().1, JobStatus::Completed);
        assert_eq!(b.await.unwrap().1, JobStatus::Completed);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 4);

        orch.shutdown().await;
    }

    #[tokio::test]
    async fn submitted_jobs_run_on_workers() {
        let (dir, input) = setup();
        let encoder = Arc::new(FakeEncoder::default());
        let orch = TranscodeOrchestrator::start(
            encoder.clone(),
            OrchestratorOptions::default(),
            CancellationToken::new(),
        );

        let id = orch
            .submit(&input, dir.path(), vec!["720p".into()])
            .unwrap();

        for _ in 0..200 {
            if orch.jobs().get(id).unwrap().status.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(orch.jobs().get(id).unwrap().status, JobStatus::Completed);
        assert!(dir.path().join("movie_720p.mp4").exists());

        orch.shutdown().await;
    }

    #[tokio::test]
    async fn full_queue_rejects_submission() {
        let (dir, input) = setup();
        let orch = TranscodeOrchestrator::start(
            Arc::new(HangingEncoder),
            OrchestratorOptions {
                workers: 1,
                queue_capacity: 1,
            },
            CancellationToken::new(),
        );

        // One job occupies the worker, one fills the queue.
        let mut accepted = 0;
        let mut rejected = 0;
        for _ in 0..5 {
            match orch.submit(&input, dir.path(), vec!["720p".into()]) {
                Ok(_) => accepted += 1,
                Err(_) => rejected += 1,
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(accepted, 2);
        assert_eq!(rejected, 3);

        orch.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_cancels_running_encode() {
        let (dir, input) = setup();
        let orch = TranscodeOrchestrator::start(
            Arc::new(HangingEncoder),
            OrchestratorOptions::default(),
            CancellationToken::new(),
        );

        let id = orch.submit(&input, dir.path(), ladder()).unwrap();
        for _ in 0..200 {
            if matches!(orch.jobs().get(id).unwrap().status, JobStatus::Running { .. }) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::timeout(Duration::from_secs(5), orch.shutdown())
            .await
            .expect("shutdown should not hang");
        assert_eq!(orch.jobs().get(id).unwrap().status, JobStatus::Cancelled);
        assert!(orch.submit(&input, dir.path(), ladder()).is_err());
    }

    #[tokio::test]
    async fn shutdown_cancels_queued_jobs() {
        let (dir, input) = setup();
        let orch = TranscodeOrchestrator::start(
            Arc::new(HangingEncoder),
            OrchestratorOptions {
                workers: 1,
                queue_capacity: 4,
            },
            CancellationToken::new(),
        );

        let running = orch.submit(&input, dir.path(), ladder()).unwrap();
        for _ in 0..200 {
            if matches!(orch.jobs().get(running).unwrap().status, JobStatus::Running { .. }) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let queued: Vec<JobId> = (0..3)
            .map(|_| orch.submit(&input, dir.path(), ladder()).unwrap())
            .collect();

        tokio::time::timeout(Duration::from_secs(5), orch.shutdown())
            .await
            .expect("shutdown should not hang");

        assert_eq!(orch.jobs().get(running).unwrap().status, JobStatus::Cancelled);
        for id in queued {
            assert_eq!(orch.jobs().get(id).unwrap().status, JobStatus::Cancelled);
        }
        assert!(!orch.jobs().list().iter().any(|r| r.status == JobStatus::Queued));
    }
}
