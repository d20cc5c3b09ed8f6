//! Quality-variant encoding.
//!
//! [`Encoder`] is the seam between the transcode orchestrator and the
//! external encoder process. [`FfmpegEncoder`] is the production
//! implementation; tests substitute their own.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reelhouse_common::{Error, Quality, Result};
use tokio_util::sync::CancellationToken;

use crate::command::{CommandError, ToolCommand};

/// Lines of encoder stderr kept in [`Error::EncoderExit`].
const STDERR_TAIL_LINES: usize = 8;

/// One encode of `input` into `output` at `quality`.
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub quality: &'a Quality,
}

/// Produces a quality variant of a source video.
///
/// Implementations must either leave a complete file at `request.output` and
/// return `Ok`, or return an error without creating `request.output`.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Encode one variant, aborting when `cancel` fires.
    async fn encode(&self, request: &EncodeRequest<'_>, cancel: &CancellationToken) -> Result<()>;
}

/// Build the ffmpeg argument list for encoding `input` into `output`.
///
/// The container is forced to MP4 because `output` may carry a temporary
/// extension while the encode is in flight.
pub fn ffmpeg_args(input: &Path, output: &Path, quality: &Quality) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        // Only diagnostics reach stderr, which is held in memory until exit.
        "-nostats".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-crf".to_string(),
        "23".to_string(),
        "-vf".to_string(),
        quality.scale_filter(),
        "-b:v".to_string(),
        quality.video_bitrate(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        quality.audio_bitrate(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-f".to_string(),
        "mp4".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Temporary path an encode writes to before being renamed into place.
fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("variant"));
    name.push(".part");
    output.with_file_name(name)
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove partial output {}: {e}", path.display());
        }
    }
}

/// Encoder that shells out to ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegEncoder {
    /// Create an encoder running the given ffmpeg executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill encodes that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, request: &EncodeRequest<'_>, cancel: &CancellationToken) -> Result<()> {
        let quality = request.quality.name.to_string();
        let partial = partial_path(request.output);

        let mut cmd = ToolCommand::new(self.program.clone());
        cmd.args(ffmpeg_args(request.input, &partial, request.quality))
            .cancel_token(cancel.clone());
        if let Some(timeout) = self.timeout {
            cmd.timeout(timeout);
        }

        tracing::debug!(
            input = %request.input.display(),
            output = %request.output.display(),
            quality = %quality,
            "Launching encoder"
        );

        let output = match cmd.execute().await {
            Ok(output) => output,
            Err(CommandError::Spawn { source, .. }) => {
                return Err(Error::EncoderLaunch {
                    quality,
                    message: source.to_string(),
                });
            }
            Err(CommandError::Cancelled { .. }) => {
                remove_partial(&partial).await;
                return Err(Error::EncoderCancelled { quality });
            }
            Err(e) => {
                remove_partial(&partial).await;
                return Err(Error::EncoderExit {
                    quality,
                    status: e.to_string(),
                    stderr: String::new(),
                });
            }
        };

        if !output.status.success() {
            remove_partial(&partial).await;
            return Err(Error::EncoderExit {
                quality,
                status: output.status.to_string(),
                stderr: output.stderr_tail(STDERR_TAIL_LINES),
            });
        }

        tokio::fs::rename(&partial, request.output).await?;
        Ok(())
    }
}
