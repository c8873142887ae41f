use std::{
    any::{type_name, Any},
    collections::HashMap,
    sync::Arc,
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    codec::{Codec, JsonCodec},
    errors::SettingsError,
    store::PreferenceStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Keep a value decoded from the store in memory, so later loads of the
    /// same key skip the decoder. A warmed value does not pin the key's type:
    /// loading it as another type decodes the stored text again and replaces
    /// the warmed copy.
    pub warm_on_read: bool,
}

impl Default for CacheOptions {
    fn default() -> Self { Self { warm_on_read: true } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Saved,
    Warmed,
}

struct CachedValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    origin: Origin,
}

impl CachedValue {
    fn new<T: Send + Sync + 'static>(value: T, origin: Origin) -> Self {
        Self { value: Arc::new(value), type_name: type_name::<T>(), origin }
    }

    /// `Ok(None)` means the entry cannot answer for `T` and the store should.
    fn get<T: Clone + 'static>(&self, key: &str) -> Result<Option<T>, SettingsError> {
        if let Some(v) = self.value.downcast_ref::<T>() {
            return Ok(Some(v.clone()));
        }
        match self.origin {
            Origin::Warmed => Ok(None),
            Origin::Saved => Err(SettingsError::TypeMismatch {
                key: key.to_owned(),
                cached: self.type_name,
                requested: type_name::<T>(),
            }),
        }
    }
}

/// Typed settings on top of a [`PreferenceStore`].
///
/// Reads are served from memory first and fall back to decoding the stored
/// JSON text. Writes go through to memory immediately and are scheduled on
/// the store. `save` and `remove` hold the memory lock while scheduling, so
/// both layers change together; concurrent saves of one key from several
/// tasks are last-write-wins and callers that need ordering must serialize
/// them.
///
/// A saved value is cached in its owned form (`str` as `String`, `[T]` as
/// `Vec<T>`) and loading it as any other type is a `TypeMismatch`. Values
/// that only came from the store (see [`CacheOptions::warm_on_read`]) can be
/// loaded as any type the stored text decodes to.
pub struct SettingsCache<C = JsonCodec> {
    memory: RwLock<HashMap<String, CachedValue>>,
    store: Arc<dyn PreferenceStore>,
    codec: C,
    options: CacheOptions,
}

impl SettingsCache<JsonCodec> {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self::with_codec(store, JsonCodec::default(), CacheOptions::default())
    }
}

impl<C: Codec> SettingsCache<C> {
    pub fn with_codec(store: Arc<dyn PreferenceStore>, codec: C, options: CacheOptions) -> Self {
        Self { memory: RwLock::new(HashMap::new()), store, codec, options }
    }

    pub fn options(&self) -> CacheOptions { self.options }

    /// Load a setting, `None` if nothing was saved under `key`.
    ///
    /// A stored value that does not decode as `T` is an error, never `None`.
    pub async fn load<T>(&self, key: &str) -> Result<Option<T>, SettingsError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        ensure_key(key)?;

        if let Some(hit) = self.memory.read().await.get(key) {
            if let Some(v) = hit.get(key)? {
                debug!(key, "settings cache hit");
                return Ok(Some(v));
            }
        }
        if !self.options.warm_on_read {
            return self.read_store(key).await;
        }

        // Re-check under the write lock: a save or remove may have run in between.
        let mut memory = self.memory.write().await;
        if let Some(hit) = memory.get(key) {
            if let Some(v) = hit.get(key)? {
                return Ok(Some(v));
            }
            debug!(key, cached = hit.type_name, "warmed setting requested as another type");
        }
        let value = self.read_store::<T>(key).await?;
        if let Some(v) = &value {
            memory.insert(key.to_owned(), CachedValue::new(v.clone(), Origin::Warmed));
        }
        Ok(value)
    }

    /// Load a setting, falling back to `default` when nothing was saved.
    pub async fn load_or<T>(&self, key: &str, default: T) -> Result<T, SettingsError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        Ok(self.load(key).await?.unwrap_or(default))
    }

    /// Save a setting, replacing any previous value. The store commit is
    /// scheduled, not awaited; see [`SettingsCache::flush`].
    ///
    /// Memory keeps `value.to_owned()`, which is what a later `load` returns.
    pub async fn save<V>(&self, key: &str, value: &V) -> Result<(), SettingsError>
    where
        V: Serialize + ToOwned + Sync + ?Sized,
        V::Owned: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        ensure_key(key)?;
        let raw = self
            .codec
            .encode(value)
            .map_err(|source| SettingsError::Serialization { key: key.to_owned(), source })?;
        let owned = value.to_owned();

        let mut memory = self.memory.write().await;
        memory.insert(key.to_owned(), CachedValue::new(owned, Origin::Saved));
        self.store.set(key, raw).await;
        drop(memory);
        debug!(key, "setting saved");
        Ok(())
    }

    /// Remove a setting from memory and store. Absent keys are a no-op.
    pub async fn remove(&self, key: &str) {
        if key.is_empty() {
            return;
        }
        let mut memory = self.memory.write().await;
        memory.remove(key);
        self.store.delete(key).await;
        drop(memory);
        debug!(key, "setting removed");
    }

    /// Whether anything is saved under `key`, in memory or in the store.
    pub async fn contains(&self, key: &str) -> bool {
        if self.memory.read().await.contains_key(key) {
            return true;
        }
        self.store.get(key).await.is_some()
    }

    /// Number of values currently held in memory.
    pub async fn cached_len(&self) -> usize {
        self.memory.read().await.len()
    }

    /// Wait until every save and remove issued so far is committed by the store.
    pub async fn flush(&self) -> Result<(), SettingsError> {
        self.store.flush().await
    }

    async fn read_store<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SettingsError> {
        let Some(raw) = self.store.get(key).await else {
            debug!(key, "setting not stored");
            return Ok(None);
        };
        debug!(key, "settings cache miss, decoding stored value");
        self.codec
            .decode(&raw)
            .map(Some)
            .map_err(|source| SettingsError::Deserialization {
                key: key.to_owned(),
                expected: type_name::<T>(),
                source,
            })
    }
}

fn ensure_key(key: &str) -> Result<(), SettingsError> {
    if key.is_empty() {
        return Err(SettingsError::InvalidKey);
    }
    Ok(())
}
