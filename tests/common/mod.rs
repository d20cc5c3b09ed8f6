//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a temporary videos directory, a
//! config pointing at it, and a full [`AppContext`] backed by a fake
//! encoder. The [`with_server`](TestHarness::with_server) constructor starts
//! Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reelhouse::config::Config;
use reelhouse::server::{create_router, AppContext};
use reelhouse::transcode::JobStatus;
use reelhouse_av::{EncodeRequest, Encoder};
use reelhouse_common::{Error, JobId, Result};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Encoder that writes a marker file instead of running ffmpeg.
#[derive(Default)]
pub struct FakeEncoder {
    pub calls: AtomicUsize,
    /// Qualities that fail with an exit error.
    pub fail_on: Vec<&'static str>,
    /// Block every encode until cancelled.
    pub hang: bool,
}

impl FakeEncoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn encode(&self, request: &EncodeRequest<'_>, cancel: &CancellationToken) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            cancel.cancelled().await;
            return Err(Error::EncoderCancelled {
                quality: request.quality.name.to_string(),
            });
        }
        if self.fail_on.contains(&request.quality.name) {
            return Err(Error::EncoderExit {
                quality: request.quality.name.to_string(),
                status: "exit status: 1".into(),
                stderr: "fake failure".into(),
            });
        }
        tokio::fs::write(request.output, format!("variant {}", request.quality.name)).await?;
        Ok(())
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`] over a
/// temporary videos directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub encoder: Arc<FakeEncoder>,
    pub cancel: CancellationToken,
    // Keeps the directory alive for the duration of the test.
    pub dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a harness with a custom configuration. The videos directory is
    /// always replaced with a fresh temporary one.
    pub fn with_config(config: Config) -> Self {
        Self::with_encoder(config, FakeEncoder::default())
    }

    pub fn with_encoder(mut config: Config, encoder: FakeEncoder) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        config.storage.videos_dir = dir.path().to_path_buf();

        let encoder = Arc::new(encoder);
        let cancel = CancellationToken::new();
        let ctx = AppContext::new(config, encoder.clone(), cancel.clone());

        Self {
            ctx,
            encoder,
            cancel,
            dir,
        }
    }

    /// Start an Axum server for this harness on a random port.
    pub async fn serve(self) -> (Self, SocketAddr) {
        let app = create_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await
                .ok();
        });

        (self, addr)
    }

    /// Start an Axum server with default config on a random port.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        Self::with_config(config).serve().await
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a file into the videos directory.
    pub fn write_video(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, data).expect("failed to write video");
        path
    }

    /// Poll the job table until `id` has started encoding.
    pub async fn wait_for_running(&self, id: JobId) {
        for _ in 0..500 {
            if let Some(record) = self.ctx.transcoder.jobs().get(id) {
                if matches!(record.status, JobStatus::Running { .. }) {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never started");
    }

    /// Poll the job table until `id` reaches a final state.
    pub async fn wait_for_job(&self, id: JobId) -> JobStatus {
        for _ in 0..500 {
            if let Some(record) = self.ctx.transcoder.jobs().get(id) {
                if record.status.is_finished() {
                    return record.status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} did not finish");
    }
}

/// Deterministic test payload: byte `i` is `i % 251`.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Minimal MP4 header followed by padding, enough to pass upload sniffing.
pub fn fake_mp4(len: usize) -> Vec<u8> {
    let mut data = vec![0, 0, 0, 0x20];
    data.extend_from_slice(b"ftypisom");
    data.extend_from_slice(&[0, 0, 2, 0]);
    data.extend_from_slice(b"isomiso2avc1mp41");
    data.resize(len.max(data.len()), 0);
    data
}
