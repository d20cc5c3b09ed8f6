use reelhouse_av::ToolPaths;
use reelhouse_common::quality::DEFAULT_LADDER;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub streaming: StreamingConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,

    #[serde(default)]
    pub tools: ToolPaths,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory holding originals and their quality variants
    #[serde(default = "default_videos_dir")]
    pub videos_dir: PathBuf,

    /// Largest accepted upload body in bytes (default: 4 GiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_videos_dir() -> PathBuf {
    PathBuf::from("videos")
}

fn default_max_upload_bytes() -> u64 {
    4 * 1024 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            videos_dir: default_videos_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Token bucket guarding the streaming routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Tokens added per second
    #[serde(default = "default_per_second")]
    pub per_second: u32,

    /// Bucket capacity
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_per_second() -> u32 {
    10
}

fn default_burst() -> u32 {
    5
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: default_per_second(),
            burst: default_burst(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Bytes read and written per chunk (default: 1 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// `max-age` advertised in Cache-Control (default: 3600)
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,
}

fn default_chunk_size() -> usize {
    1 << 20
}

fn default_cache_max_age() -> u64 {
    3600
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            cache_max_age_secs: default_cache_max_age(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscodeConfig {
    /// Queue a transcode job for every upload (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of concurrent transcode workers (default: 2)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Jobs that may wait in the queue before uploads are refused
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Qualities requested for each upload, in encode order
    #[serde(default = "default_qualities")]
    pub qualities: Vec<String>,

    /// Kill a single encode after this many seconds (default: unbounded)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    32
}

fn default_qualities() -> Vec<String> {
    DEFAULT_LADDER.iter().map(|q| q.to_string()).collect()
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            qualities: default_qualities(),
            timeout_secs: None,
        }
    }
}
