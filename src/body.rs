//! Pluggable encoding of application payloads into frame bodies.
//!
//! The engine only ever needs `encode` (for `send`) and `decode` (for typed
//! subscriptions). [`JsonCodec`] is the default.
//!
//! ```
//! use stomp_engine::body::{BodyCodec, JsonCodec};
//!
//! let codec = JsonCodec;
//! let encoded = codec.encode(&vec![1, 2, 3]).unwrap();
//! assert_eq!(encoded, "[1,2,3]");
//! let decoded: Vec<u32> = codec.decode(&encoded).unwrap();
//! assert_eq!(decoded, vec![1, 2, 3]);
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BodyError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Converts application values to and from body text.
pub trait BodyCodec: Send + Sync + 'static {
    /// Value for the `content-type` header of encoded bodies.
    fn content_type(&self) -> &str;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, BodyError>;

    fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<T, BodyError>;
}

/// JSON bodies via `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl BodyCodec for JsonCodec {
    fn content_type(&self) -> &str {
        "application/json;charset=UTF-8"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, BodyError> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<T, BodyError> {
        Ok(serde_json::from_str(body)?)
    }
}
