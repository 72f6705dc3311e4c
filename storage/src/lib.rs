pub mod error;
pub mod history_backend;
pub mod memory;
pub mod file_history_store;

pub use error::{StorageError, StorageOperation, StorageResult, StorageResultExt};
pub use history_backend::LeafHistoryStore;
pub use memory::InMemoryLeafHistoryStore;
pub use file_history_store::FileLeafHistoryStore;
