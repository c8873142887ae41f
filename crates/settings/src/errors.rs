use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid key: setting keys must be non-empty")]
    InvalidKey,
    #[error("cannot serialize setting `{key}`: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot deserialize setting `{key}` as {expected}: {source}")]
    Deserialization {
        key: String,
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("setting `{key}` is cached as {cached}, requested as {requested}")]
    TypeMismatch {
        key: String,
        cached: &'static str,
        requested: &'static str,
    },
    #[error("store error: {0}")]
    Store(String),
}

impl SettingsError {
    pub fn store(e: impl std::fmt::Display) -> Self { Self::Store(e.to_string()) }
}
