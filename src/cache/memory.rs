//! In-process cache used by tests in place of Redis

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::Cache;
use crate::error::AppResult;

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: String) -> AppResult<()> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}
