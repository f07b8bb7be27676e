//! Persistent key-value storage for wxloop.
//!
//! This crate provides:
//! - The `KeyValueStore` trait (`get` / `set` / `remove`)
//! - An in-memory store for tests and ephemeral sessions
//! - A JSON file store with atomic replace-on-write
//! - The well-known storage key names

pub mod error;
pub mod file;
pub mod keys;
pub mod memory;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use store::{Entries, KeyValueStore};
