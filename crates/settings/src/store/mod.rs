//! Preference store abstractions
//!
//! A preference store is a durable `String -> String` map. Writes are
//! scheduled: `set` and `delete` return once the change is visible to `get`,
//! while the durable commit may happen later. `flush` waits for it.

use async_trait::async_trait;

use crate::errors::SettingsError;

pub mod json_file;
pub mod memory;

pub use json_file::JsonFilePreferenceStore;
pub use memory::MemoryPreferenceStore;

/// Trait abstraction for the string-keyed settings backend.
/// Implementations can be in-memory, file-backed, or platform preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String);
    async fn delete(&self, key: &str);
    /// Wait until every change scheduled before this call is committed.
    async fn flush(&self) -> Result<(), SettingsError>;
}
