//! Storage envelope for a single resource.
//!
//! A [`Wrapper`] is always `compress(encode(resource))` plus the type tag,
//! encoding and compression needed to reverse it. Decoding reads those
//! fields from the envelope itself and never guesses.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use vigil_types::{codec, DynResource, Encoding, ObjectMeta, Resource, TypeMeta, TypeRegistry};

use crate::error::WrapError;

/// zstd level used for envelopes. Favors speed over ratio.
const ZSTD_LEVEL: i32 = 1;

/// Payload compression of an envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compression {
    None,
    #[default]
    Zstd,
}

impl Compression {
    fn compress(self, data: Vec<u8>) -> Result<Vec<u8>, WrapError> {
        match self {
            Self::None => Ok(data),
            Self::Zstd => zstd::encode_all(data.as_slice(), ZSTD_LEVEL)
                .map_err(|e| WrapError::Compression(e.to_string())),
        }
    }

    fn decompress(self, data: &[u8]) -> Result<Cow<'_, [u8]>, WrapError> {
        match self {
            Self::None => Ok(Cow::Borrowed(data)),
            Self::Zstd => zstd::decode_all(data)
                .map(Cow::Owned)
                .map_err(|e| WrapError::Compression(e.to_string())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Zstd => write!(f, "zstd"),
        }
    }
}

/// How the payload encoding is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingPreference {
    /// Binary if the type supports it, JSON otherwise.
    #[default]
    Default,
    /// Binary, failing for types that do not support it.
    ForceBinary,
    /// JSON, always.
    ForceText,
}

/// Options controlling how a resource is wrapped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapOptions {
    pub encoding: EncodingPreference,
    pub compression: Compression,
}

impl WrapOptions {
    pub fn force_binary_encoding(mut self) -> Self {
        self.encoding = EncodingPreference::ForceBinary;
        self
    }

    pub fn force_text_encoding(mut self) -> Self {
        self.encoding = EncodingPreference::ForceText;
        self
    }

    pub fn default_encoding(mut self) -> Self {
        self.encoding = EncodingPreference::Default;
        self
    }

    pub fn no_compression(mut self) -> Self {
        self.compression = Compression::None;
        self
    }

    pub fn default_compression(mut self) -> Self {
        self.compression = Compression::default();
        self
    }

    /// Options that reproduce an existing envelope's encoding and compression.
    pub fn preserving(wrapper: &Wrapper) -> Self {
        let encoding = match wrapper.encoding {
            Encoding::Binary => EncodingPreference::ForceBinary,
            Encoding::Json => EncodingPreference::ForceText,
        };
        Self {
            encoding,
            compression: wrapper.compression,
        }
    }

    /// Resolve the encoding for a type, validating forced choices.
    pub fn select_encoding(
        &self,
        type_meta: &TypeMeta,
        binary_capable: bool,
    ) -> Result<Encoding, WrapError> {
        match (self.encoding, binary_capable) {
            (EncodingPreference::ForceText, _) | (EncodingPreference::Default, false) => {
                Ok(Encoding::Json)
            }
            (EncodingPreference::ForceBinary, true) | (EncodingPreference::Default, true) => {
                Ok(Encoding::Binary)
            }
            (EncodingPreference::ForceBinary, false) => {
                Err(WrapError::BinaryUnsupported(type_meta.clone()))
            }
        }
    }
}

/// Encoded, compressed, type-tagged representation of one resource.
///
/// Backends must persist all fields verbatim; nothing else is needed to
/// decode it again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wrapper {
    pub type_meta: TypeMeta,
    pub encoding: Encoding,
    pub compression: Compression,
    /// `compress(encode(resource))`.
    pub value: Vec<u8>,
    /// Copy of the resource's metadata, readable without decoding.
    pub metadata: ObjectMeta,
}

impl Wrapper {
    /// Wrap a typed resource.
    pub fn wrap<R: Resource>(resource: &R, options: &WrapOptions) -> Result<Self, WrapError> {
        let type_meta = R::type_meta();
        let encoding = options.select_encoding(&type_meta, R::binary_encodable())?;
        let encoded = codec::encode(resource, encoding)?;
        Self::seal(type_meta, encoding, options.compression, encoded, resource.metadata().clone())
    }

    /// Wrap a type-erased resource.
    pub fn wrap_dyn(resource: &dyn DynResource, options: &WrapOptions) -> Result<Self, WrapError> {
        let type_meta = resource.resource_type();
        let encoding = options.select_encoding(&type_meta, resource.supports_binary())?;
        let encoded = resource.encode(encoding)?;
        Self::seal(
            type_meta,
            encoding,
            options.compression,
            encoded,
            resource.object_meta().clone(),
        )
    }

    fn seal(
        type_meta: TypeMeta,
        encoding: Encoding,
        compression: Compression,
        encoded: Vec<u8>,
        metadata: ObjectMeta,
    ) -> Result<Self, WrapError> {
        Ok(Self {
            type_meta,
            encoding,
            compression,
            value: compression.compress(encoded)?,
            metadata,
        })
    }

    /// Decode into whatever type the registry has under this envelope's tag.
    pub fn unwrap(&self, registry: &TypeRegistry) -> Result<Box<dyn DynResource>, WrapError> {
        let codec = registry.resolve(&self.type_meta)?;
        let raw = self.compression.decompress(&self.value)?;
        Ok(codec.decode(&raw, self.encoding)?)
    }

    /// Decode into a freshly allocated `R`.
    pub fn unwrap_into<R: Resource>(&self) -> Result<R, WrapError> {
        let expected = R::type_meta();
        if expected != self.type_meta {
            return Err(WrapError::TypeMismatch {
                expected,
                found: self.type_meta.clone(),
            });
        }
        let raw = self.compression.decompress(&self.value)?;
        Ok(codec::decode(&raw, self.encoding)?)
    }
}

/// Result page of a list operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WrapList {
    pub items: Vec<Wrapper>,
    /// Token for the next page, `None` on the last page.
    pub continue_token: Option<String>,
}

impl WrapList {
    pub fn unwrap_into<R: Resource>(&self) -> Result<Vec<R>, WrapError> {
        self.items.iter().map(Wrapper::unwrap_into::<R>).collect()
    }

    pub fn unwrap(&self, registry: &TypeRegistry) -> Result<Vec<Box<dyn DynResource>>, WrapError> {
        self.items.iter().map(|w| w.unwrap(registry)).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
