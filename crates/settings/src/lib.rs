//! Typed settings persisted as JSON in a string-keyed preference store.
//! - `SettingsCache` keeps decoded values in memory and writes through to the store.
//! - `store` holds the backend trait plus in-memory and JSON file implementations.
//! - `codec` turns values into the text the store keeps.

pub mod cache;
pub mod codec;
pub mod errors;
pub mod store;

pub use cache::{CacheOptions, SettingsCache};
pub use codec::{Codec, JsonCodec};
pub use errors::SettingsError;
pub use store::{JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
