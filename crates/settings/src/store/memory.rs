use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::PreferenceStore;
use crate::errors::SettingsError;

/// Process-local preference store. Commits are immediate and nothing survives
/// the instance.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self { Self::default() }

    /// Seed the store with raw entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { inner: RwLock::new(map) }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) {
        self.inner.write().await.insert(key.to_owned(), value);
    }

    async fn delete(&self, key: &str) {
        self.inner.write().await.remove(key);
    }

    async fn flush(&self) -> Result<(), SettingsError> { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_basic_crud() -> Result<(), anyhow::Error> {
        let store = MemoryPreferenceStore::with_entries([("a", "1")]);
        assert_eq!(store.get("a").await.as_deref(), Some("1"));
        assert!(store.get("b").await.is_none());

        store.set("b", "2".into()).await;
        store.set("a", "10".into()).await;
        assert_eq!(store.get("a").await.as_deref(), Some("10"));
        assert_eq!(store.len().await, 2);

        store.delete("a").await;
        store.delete("a").await;
        assert!(store.get("a").await.is_none());
        assert_eq!(store.len().await, 1);

        store.flush().await?;
        Ok(())
    }
}
