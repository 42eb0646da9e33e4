use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{FlowError, Result};

/// Shared key-value state that flows through a pipeline execution.
///
/// Values are stored as JSON so stages can exchange arbitrary serializable
/// data without knowing each other's concrete types. Cloning a `Context` is
/// cheap and clones share the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, key: impl Into<String>, value: impl serde::Serialize) {
        let value = serde_json::to_value(value).expect("context value must be serializable");
        self.data.insert(key.into(), value);
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Like [`Context::get`], but a missing or undeserializable value is a
    /// stage error rather than `None`.
    pub async fn get_required<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get(key)
            .await
            .ok_or_else(|| FlowError::Context(key.to_string()))
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}
