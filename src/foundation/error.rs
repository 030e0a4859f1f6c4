use std::path::PathBuf;

/// Convenience result type used across the crate.
pub type MediaResult<T> = Result<T, MediaError>;

/// Top-level error taxonomy for classification, conversion jobs and caching.
#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    /// The requested source path does not exist.
    #[error("source not found: '{}'", .0.display())]
    SourceNotFound(PathBuf),

    /// The source extension is in neither the native nor the transcodable allow-list.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The media-probe tool could not produce a result. Degrades to the extension heuristic.
    #[error("probe unavailable: {0}")]
    ProbeUnavailable(String),

    /// The external transcoder/extractor is missing.
    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),

    /// The external process could not be started.
    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    /// The external process exceeded its configured maximum wait.
    #[error("process timed out: {0}")]
    ProcessTimedOut(String),

    /// The job was cancelled by the caller.
    #[error("process cancelled: {0}")]
    ProcessCancelled(String),

    /// The external process exited with a failure status.
    #[error("process failed: {0}")]
    ProcessFailed(String),

    /// The process reported success but produced no output.
    #[error("output missing after success: '{}'", .0.display())]
    OutputMissingAfterSuccess(PathBuf),

    /// A cache sidecar could not be read or parsed.
    #[error("cache corrupt: {0}")]
    CacheCorrupt(String),

    /// Invalid configuration values.
    #[error("config error: {0}")]
    Config(String),

    /// A frame image could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Copyable discriminant of [`MediaError`], suitable for reporting across threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`MediaError::SourceNotFound`].
    SourceNotFound,
    /// See [`MediaError::UnsupportedFormat`].
    UnsupportedFormat,
    /// See [`MediaError::ProbeUnavailable`].
    ProbeUnavailable,
    /// See [`MediaError::ToolUnavailable`].
    ToolUnavailable,
    /// See [`MediaError::SpawnFailed`].
    SpawnFailed,
    /// See [`MediaError::ProcessTimedOut`].
    ProcessTimedOut,
    /// See [`MediaError::ProcessCancelled`].
    ProcessCancelled,
    /// See [`MediaError::ProcessFailed`].
    ProcessFailed,
    /// See [`MediaError::OutputMissingAfterSuccess`].
    OutputMissingAfterSuccess,
    /// See [`MediaError::CacheCorrupt`].
    CacheCorrupt,
    /// See [`MediaError::Config`].
    Config,
    /// See [`MediaError::Decode`].
    Decode,
    /// See [`MediaError::Other`].
    Other,
}

impl MediaError {
    /// Build a [`MediaError::UnsupportedFormat`] value.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Build a [`MediaError::ProbeUnavailable`] value.
    pub fn probe_unavailable(msg: impl Into<String>) -> Self {
        Self::ProbeUnavailable(msg.into())
    }

    /// Build a [`MediaError::ToolUnavailable`] value.
    pub fn tool_unavailable(msg: impl Into<String>) -> Self {
        Self::ToolUnavailable(msg.into())
    }

    /// Build a [`MediaError::SpawnFailed`] value.
    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        Self::SpawnFailed(msg.into())
    }

    /// Build a [`MediaError::ProcessFailed`] value.
    pub fn process_failed(msg: impl Into<String>) -> Self {
        Self::ProcessFailed(msg.into())
    }

    /// Build a [`MediaError::CacheCorrupt`] value.
    pub fn cache_corrupt(msg: impl Into<String>) -> Self {
        Self::CacheCorrupt(msg.into())
    }

    /// Build a [`MediaError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`MediaError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Return the copyable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceNotFound(_) => ErrorKind::SourceNotFound,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::ProbeUnavailable(_) => ErrorKind::ProbeUnavailable,
            Self::ToolUnavailable(_) => ErrorKind::ToolUnavailable,
            Self::SpawnFailed(_) => ErrorKind::SpawnFailed,
            Self::ProcessTimedOut(_) => ErrorKind::ProcessTimedOut,
            Self::ProcessCancelled(_) => ErrorKind::ProcessCancelled,
            Self::ProcessFailed(_) => ErrorKind::ProcessFailed,
            Self::OutputMissingAfterSuccess(_) => ErrorKind::OutputMissingAfterSuccess,
            Self::CacheCorrupt(_) => ErrorKind::CacheCorrupt,
            Self::Config(_) => ErrorKind::Config,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

/// Cloneable failure description stored in job snapshots and load outcomes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureReason {
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl FailureReason {
    /// Build a reason from a kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&MediaError> for FailureReason {
    fn from(err: &MediaError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
