//! JSON file store.
//!
//! Persists the whole key space as a single JSON object. Every mutation is a
//! read-modify-write under an async lock, and the new contents are written to
//! a sibling temp file and renamed into place so a crash never leaves a
//! half-written store behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::store::{Entries, KeyValueStore};

/// Store backed by a JSON file on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StorageResult<HashMap<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(HashMap::new());
        }

        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(StorageError::Corrupt(format!(
                "{} does not hold a JSON object (found {})",
                self.path.display(),
                type_name(&other)
            ))),
        }
    }

    async fn persist(&self, entries: &HashMap<String, Value>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = ?self.path, keys = entries.len(), "Persisted store");
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    fn name(&self) -> &'static str {
        "json_file"
    }

    async fn get(&self, keys: &[&str]) -> StorageResult<Entries> {
        let _guard = self.lock.lock().await;
        let mut all = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|k| all.remove(*k).map(|v| (k.to_string(), v)))
            .collect())
    }

    async fn set(&self, entries: Entries) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut all = self.load().await?;
        all.extend(entries);
        self.persist(&all).await
    }

    async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut all = self.load().await?;
        let before = all.len();
        for key in keys {
            all.remove(*key);
        }
        if all.len() != before {
            self.persist(&all).await?;
        }
        Ok(())
    }
}
