//! Error taxonomy shared by the build and reconstruct paths.

use std::io;
use std::path::PathBuf;

/// Exit status for a run that finished but had per-file failures.
pub const EXIT_FAILURES: i32 = 1;
/// Exit status for a malformed or missing mapping specification.
pub const EXIT_MAPPING: i32 = 2;
/// Exit status when a required external capability is missing.
pub const EXIT_CAPABILITY: i32 = 3;
/// Exit status for a run the operator aborted.
pub const EXIT_ABORTED: i32 = 130;

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid mapping specification '{path}': {reason}")]
    MappingFormat { path: PathBuf, reason: String },

    #[error("mapping specification not found: {0}")]
    MappingFileNotFound(PathBuf),

    #[error("required capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("operation aborted by user")]
    Aborted,

    #[error("unsafe path in artifact: '{0}'")]
    UnsafePath(String),

    #[error("invalid artifact: {0}")]
    ArtifactFormat(String),

    #[error("invalid configuration '{path}': {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl PackError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit status for this error when it ends a run.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MappingFormat { .. } | Self::MappingFileNotFound(_) => EXIT_MAPPING,
            Self::CapabilityUnavailable(_) => EXIT_CAPABILITY,
            Self::Aborted => EXIT_ABORTED,
            _ => EXIT_FAILURES,
        }
    }
}

pub type Result<T> = std::result::Result<T, PackError>;
