//! Foundation types for the Vigil monitoring store.
//!
//! Every value the backend persists (checks, entities, handlers, silences)
//! implements the [`Resource`] contract defined here. The storage layer never
//! depends on concrete resource types: it works with [`TypeMeta`] tags,
//! [`ObjectMeta`] addressing, and the explicit [`TypeRegistry`] that maps a tag
//! back to a decoder.
//!
//! # Key Types
//!
//! - [`Resource`] -- Static contract for persisted, validated domain objects
//! - [`DynResource`] -- Object-safe, type-erased view of any `Resource`
//! - [`TypeMeta`] -- Logical type name and API version
//! - [`ObjectMeta`] -- Namespace, name, labels, and annotations
//! - [`TypeRegistry`] -- Registration table from `TypeMeta` to a codec
//! - [`Encoding`] -- Text (JSON) or binary (bincode) payload encoding

pub mod codec;
pub mod error;
pub mod meta;
pub mod registry;
pub mod resource;

pub use codec::Encoding;
pub use error::TypeError;
pub use meta::{ObjectMeta, TypeMeta};
pub use registry::{ResourceCodec, TypeRegistry};
pub use resource::{DynResource, Resource};
