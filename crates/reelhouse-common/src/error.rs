//! Common error types used throughout reelhouse.
//!
//! Every failure the streaming engine or the transcode orchestrator can
//! surface is a variant of [`Error`]. Handlers derive the HTTP status with
//! [`Error::http_status`]; background jobs only log and record them.

/// Common error type for reelhouse.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The `Range` header could not be parsed.
    #[error("Malformed range: {0}")]
    MalformedRange(String),

    /// The `Range` header parsed but does not fit inside the resource.
    #[error("Range not satisfiable: bytes {start}-{end} of {size}")]
    UnsatisfiableRange {
        /// Requested first byte.
        start: u64,
        /// Requested last byte (inclusive).
        end: u64,
        /// Total size of the resource.
        size: u64,
    },

    /// The shared rate bucket had no tokens left.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The requested media file does not exist in the store.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Reading from the source or writing to the client failed mid-transfer.
    #[error("Stream I/O error: {0}")]
    StreamIo(#[source] std::io::Error),

    /// The quality name is not part of the catalog.
    #[error("Unknown quality: {0}")]
    UnknownQuality(String),

    /// The encoder process could not be started.
    #[error("Encoder failed to launch for {quality}: {message}")]
    EncoderLaunch {
        /// Quality being encoded.
        quality: String,
        /// Human-readable error description.
        message: String,
    },

    /// The encoder process ran but exited unsuccessfully.
    #[error("Encoder exited with {status} for {quality}: {stderr}")]
    EncoderExit {
        /// Quality being encoded.
        quality: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Tail of the encoder's standard error.
        stderr: String,
    },

    /// The encoder was killed because the server is shutting down.
    #[error("Encoding of {quality} cancelled")]
    EncoderCancelled {
        /// Quality being encoded.
        quality: String,
    },

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation outside of a transfer failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new ResourceNotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::ResourceNotFound(msg.into())
    }

    /// Create a new MalformedRange error.
    pub fn malformed_range<S: Into<String>>(msg: S) -> Self {
        Self::MalformedRange(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Map this error to an HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::MalformedRange(_) => 400,
            Error::UnsatisfiableRange { .. } => 416,
            Error::RateLimited => 429,
            Error::ResourceNotFound(_) => 404,
            Error::StreamIo(_) => 500,
            Error::UnknownQuality(_) => 400,
            Error::EncoderLaunch { .. } => 502,
            Error::EncoderExit { .. } => 502,
            Error::EncoderCancelled { .. } => 503,
            Error::InvalidInput(_) => 400,
            Error::Io(_) => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::MalformedRange(_) => "malformed_range",
            Error::UnsatisfiableRange { .. } => "unsatisfiable_range",
            Error::RateLimited => "rate_limited",
            Error::ResourceNotFound(_) => "not_found",
            Error::StreamIo(_) => "stream_io_error",
            Error::UnknownQuality(_) => "unknown_quality",
            Error::EncoderLaunch { .. } => "encoder_launch_failure",
            Error::EncoderExit { .. } => "encoder_exit_failure",
            Error::EncoderCancelled { .. } => "encoder_cancelled",
            Error::InvalidInput(_) => "invalid_input",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
