use crate::error::StorageResult;
use crate::history_backend::LeafHistoryStore;
use parking_lot::RwLock;
use squid_types::LeafHistoryEntry;

/// In-memory leaf history
///
/// Entries are kept in append order and reversed on read.
#[derive(Debug, Default)]
pub struct InMemoryLeafHistoryStore {
    entries: RwLock<Vec<LeafHistoryEntry>>,
}

impl InMemoryLeafHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeafHistoryStore for InMemoryLeafHistoryStore {
    fn append(&self, entry: &LeafHistoryEntry) -> StorageResult<()> {
        self.entries.write().push(entry.clone());
        Ok(())
    }

    fn list_all(&self) -> StorageResult<Vec<LeafHistoryEntry>> {
        Ok(self.entries.read().iter().rev().cloned().collect())
    }

    fn count(&self) -> StorageResult<usize> {
        Ok(self.entries.read().len())
    }
}
