//! Leaf history backend trait
//!
//! Every non-VALID leaf transform is recorded once. Backends are append-only
//! and list entries newest first.

use crate::error::StorageResult;
use squid_types::LeafHistoryEntry;
use std::fmt::Debug;

/// Backend trait for leaf history implementations
pub trait LeafHistoryStore: Send + Sync + Debug {
    /// Append one entry. Entries are never rewritten.
    fn append(&self, entry: &LeafHistoryEntry) -> StorageResult<()>;

    /// All entries, newest first.
    fn list_all(&self) -> StorageResult<Vec<LeafHistoryEntry>>;

    fn count(&self) -> StorageResult<usize> {
        Ok(self.list_all()?.len())
    }
}
