//! Error types for merkle tree operations.

use thiserror::Error;

/// Result type for merkle operations
pub type MerkleResult<T> = Result<T, MerkleError>;

/// Errors that can occur during merkle tree operations.
///
/// A proof that fails to verify is not an error; verification returns `false`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// A tree needs at least one leaf
    #[error("Cannot build a tree from zero leaves")]
    EmptyInput,

    /// Leaf index out of range
    #[error("Invalid leaf index: {index} >= {size}")]
    InvalidIndex { index: usize, size: usize },

    /// Invalid hash length
    #[error("Invalid hash length: expected {expected}, got {got}")]
    InvalidHashLength { expected: usize, got: usize },
}

impl From<MerkleError> for squid_types::SquidError {
    fn from(e: MerkleError) -> Self {
        squid_types::SquidError::InvalidParameters(e.to_string())
    }
}
