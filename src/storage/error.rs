//! Error types for measurement log operations

use std::fmt;
use std::path::PathBuf;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Why a measurement log could not be read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorruptionKind {
    /// The log file does not exist (yet)
    Missing,

    /// A line of an existing log could not be decoded
    MalformedRow {
        /// 1-based line number inside the file (the header is line 1)
        line: usize,
        reason: String,
    },
}

/// Errors that can occur during storage operations
#[derive(Debug)]
pub enum StorageError {
    /// The persisted log is absent or contains an undecodable row
    LogCorruption { path: PathBuf, kind: CorruptionKind },

    /// I/O error (file access, etc.)
    IoError(std::io::Error),
}

impl StorageError {
    /// `true` if the log simply has not been created yet.
    ///
    /// Callers treat this as "no history" rather than a hard failure.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            StorageError::LogCorruption {
                kind: CorruptionKind::Missing,
                ..
            }
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::LogCorruption { path, kind } => match kind {
                CorruptionKind::Missing => {
                    write!(f, "measurement log {} does not exist", path.display())
                }
                CorruptionKind::MalformedRow { line, reason } => write!(
                    f,
                    "measurement log {} is corrupt at line {}: {}",
                    path.display(),
                    line,
                    reason
                ),
            },
            StorageError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err)
    }
}
