//! Key-value store trait.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageResult;

/// Entries read from or written to a store.
pub type Entries = HashMap<String, Value>;

/// Minimal asynchronous key-value store.
///
/// `get` returns only the keys that exist; missing keys are simply absent
/// from the result rather than an error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn get(&self, keys: &[&str]) -> StorageResult<Entries>;

    async fn set(&self, entries: Entries) -> StorageResult<()>;

    async fn remove(&self, keys: &[&str]) -> StorageResult<()>;
}
