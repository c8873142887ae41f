use serde::{de::DeserializeOwned, Serialize};

/// Text encoding used between the memory cache and the preference store.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, serde_json::Error>;
    fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T, serde_json::Error>;
}

/// JSON codec backed by `serde_json`. Compact output unless `pretty` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub fn new(pretty: bool) -> Self { Self { pretty } }

    pub fn is_pretty(&self) -> bool { self.pretty }
}

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, serde_json::Error> {
        if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }

    fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
