//! # reelhouse-av
//!
//! External encoder support for reelhouse.
//!
//! This crate provides functionality for:
//! - Discovering external tools (ffmpeg, ffprobe) on `PATH` or at configured
//!   locations
//! - Running tool processes with captured output, optional timeouts, and a
//!   cancellation token that kills the child on shutdown
//! - Encoding a source video into a catalog quality preset through the
//!   [`Encoder`] trait
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use reelhouse_av::{EncodeRequest, Encoder, FfmpegEncoder};
//! use reelhouse_common::quality;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> reelhouse_common::Result<()> {
//! let encoder = FfmpegEncoder::new("ffmpeg");
//! let request = EncodeRequest {
//!     input: Path::new("videos/clip.mov"),
//!     output: Path::new("videos/clip_720p.mp4"),
//!     quality: quality::lookup("720p")?,
//! };
//! encoder.encode(&request, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod encoder;
pub mod tools;

// Re-exports
pub use command::{CommandError, ToolCommand, ToolOutput};
pub use encoder::{ffmpeg_args, EncodeRequest, Encoder, FfmpegEncoder};
pub use tools::{ToolInfo, ToolPaths, ToolRegistry};
