//! Explicit registration table from [`TypeMeta`] to a resource codec.
//!
//! Stored envelopes only carry a type tag. To turn them back into values, a
//! backend asks the registry for the codec registered under that tag. Types
//! are registered once at start-up; the registry is then shared read-only.

use std::collections::HashMap;
use std::fmt;

use crate::codec::{self, Encoding};
use crate::error::TypeError;
use crate::meta::TypeMeta;
use crate::resource::{DynResource, Resource};

type DecodeFn = fn(&[u8], Encoding) -> Result<Box<dyn DynResource>, TypeError>;
type FromJsonFn = fn(serde_json::Value) -> Result<Box<dyn DynResource>, TypeError>;

/// Decoding entry points for one registered resource type.
#[derive(Clone, Copy)]
pub struct ResourceCodec {
    decode: DecodeFn,
    from_json: FromJsonFn,
    binary: bool,
}

impl ResourceCodec {
    /// Codec for the concrete type `R`.
    pub fn of<R: Resource>() -> Self {
        Self {
            decode: decode_boxed::<R>,
            from_json: from_json_boxed::<R>,
            binary: R::binary_encodable(),
        }
    }

    /// Decode an encoded (already decompressed) payload.
    pub fn decode(&self, bytes: &[u8], encoding: Encoding) -> Result<Box<dyn DynResource>, TypeError> {
        (self.decode)(bytes, encoding)
    }

    /// Build a value from its JSON representation.
    pub fn from_json(&self, value: serde_json::Value) -> Result<Box<dyn DynResource>, TypeError> {
        (self.from_json)(value)
    }

    pub fn supports_binary(&self) -> bool {
        self.binary
    }
}

impl fmt::Debug for ResourceCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCodec")
            .field("binary", &self.binary)
            .finish()
    }
}

fn decode_boxed<R: Resource>(bytes: &[u8], encoding: Encoding) -> Result<Box<dyn DynResource>, TypeError> {
    let value: R = codec::decode(bytes, encoding)?;
    Ok(Box::new(value))
}

fn from_json_boxed<R: Resource>(value: serde_json::Value) -> Result<Box<dyn DynResource>, TypeError> {
    let value: R =
        serde_json::from_value(value).map_err(|e| TypeError::Serialization(e.to_string()))?;
    Ok(Box::new(value))
}

/// Mapping of `(api_version, type_name)` to the codec of the implementing type.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    codecs: HashMap<TypeMeta, ResourceCodec>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `R` under its [`Resource::type_meta`]. Re-registering the same
    /// tag replaces the previous codec.
    pub fn register<R: Resource>(&mut self) -> &mut Self {
        self.codecs.insert(R::type_meta(), ResourceCodec::of::<R>());
        self
    }

    /// Look up the codec for a stored type tag.
    pub fn resolve(&self, type_meta: &TypeMeta) -> Result<&ResourceCodec, TypeError> {
        self.codecs
            .get(type_meta)
            .ok_or_else(|| TypeError::UnknownType(type_meta.clone()))
    }

    pub fn contains(&self, type_meta: &TypeMeta) -> bool {
        self.codecs.contains_key(type_meta)
    }

    /// All registered type tags, sorted.
    pub fn types(&self) -> Vec<TypeMeta> {
        let mut types: Vec<TypeMeta> = self.codecs.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}
