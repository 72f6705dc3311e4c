// ========== Core Modules ==========
pub mod leaf;           // Derived leaves, branching parameters, leaf actions
pub mod node;           // Dynamic tree node states
pub mod event;          // External transition events and leaf history

pub use leaf::{BranchingParams, LeafAction, LeafRecord, MAX_LEAVES, MAX_LEAF_BITS};
pub use node::{NodeId, NodeState};
pub use event::{ExternalEventType, LeafHistoryEntry};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// RFC 3339 timestamp used in history records and responses.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

// Error types
pub type SquidResult<T> = Result<T, SquidError>;

/// Top-level error taxonomy.
///
/// Integrity failures are deliberately absent: a failed proof or a
/// compromised node is reported as a value, never raised.
#[derive(Debug, thiserror::Error)]
pub enum SquidError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Empty batch")]
    EmptyBatch,

    #[error("No valid indices in {0:?}")]
    InvalidIndices(Vec<usize>),

    #[error("Structural failure: {0}")]
    StructuralFailure(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SquidError {
    /// Caller-side errors are never retried.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            SquidError::InvalidParameters(_) | SquidError::EmptyBatch | SquidError::InvalidIndices(_)
        )
    }
}
