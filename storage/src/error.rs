//! Errors raised by the leaf history stores.
//!
//! File failures carry the operation and the path they happened on:
//!
//! ```ignore
//! use squid_storage::error::{StorageOperation, StorageResultExt};
//!
//! std::fs::read_to_string(&path).with_context(StorageOperation::Read, &path)?;
//! ```

use squid_types::SquidError;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    Open,
    Append,
    Read,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageOperation::Open => "open",
            StorageOperation::Append => "append",
            StorageOperation::Read => "read",
        })
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("History {op} failed on {}: {source}", path.display())]
    Io {
        op: StorageOperation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot encode history entry: {0}")]
    Serialization(String),

    /// A complete line that does not parse as an entry.
    #[error("Corrupt history line {line} in {}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl StorageError {
    pub fn operation(&self) -> Option<StorageOperation> {
        match self {
            StorageError::Io { op, .. } => Some(*op),
            StorageError::Corrupt { .. } => Some(StorageOperation::Read),
            StorageError::Serialization(_) => Some(StorageOperation::Append),
        }
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, StorageError::Corrupt { .. })
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Attach the failing operation and path to an I/O result.
pub trait StorageResultExt<T> {
    fn with_context(self, op: StorageOperation, path: impl AsRef<Path>) -> StorageResult<T>;
}

impl<T> StorageResultExt<T> for std::io::Result<T> {
    fn with_context(self, op: StorageOperation, path: impl AsRef<Path>) -> StorageResult<T> {
        self.map_err(|source| StorageError::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}

impl From<StorageError> for SquidError {
    fn from(err: StorageError) -> Self {
        SquidError::Storage(err.to_string())
    }
}
