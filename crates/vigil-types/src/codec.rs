use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Payload encoding of a stored resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// Self-describing JSON. Works for every resource.
    Json,
    /// Compact bincode. Only for resources that opt in via
    /// [`Resource::binary_encodable`](crate::Resource::binary_encodable).
    Binary,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Encode a value with the given encoding.
pub fn encode<T: Serialize + ?Sized>(value: &T, encoding: Encoding) -> Result<Vec<u8>, TypeError> {
    match encoding {
        Encoding::Json => {
            serde_json::to_vec(value).map_err(|e| TypeError::Serialization(e.to_string()))
        }
        Encoding::Binary => {
            bincode::serialize(value).map_err(|e| TypeError::Serialization(e.to_string()))
        }
    }
}

/// Decode a value previously produced by [`encode`] with the same encoding.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], encoding: Encoding) -> Result<T, TypeError> {
    match encoding {
        Encoding::Json => {
            serde_json::from_slice(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
        }
        Encoding::Binary => {
            bincode::deserialize(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
        }
    }
}
