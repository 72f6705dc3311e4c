//! In-memory storage implementations
//!
//! Suitable for testing and hosts without persistence.

pub mod history_store;

pub use history_store::InMemoryLeafHistoryStore;
