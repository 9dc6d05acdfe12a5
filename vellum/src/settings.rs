//! Key/value settings collaborator.
//!
//! The runtime itself never reads settings; it only hands the store to
//! components through [`crate::AppContext`].

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;

/// Asynchronous key/value settings surface
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a setting
    async fn get_setting(&self, key: &str) -> Result<Option<Value>>;

    /// Write a setting
    async fn set_setting(&self, key: &str, value: Value) -> Result<()>;

    /// Read a setting, falling back to `default`
    async fn get_or(&self, key: &str, default: Value) -> Result<Value> {
        Ok(self.get_setting(key).await?.unwrap_or(default))
    }
}

/// Volatile store, for tests and sessions without persistence
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, Value>>,
}

impl MemorySettings {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get_setting(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
