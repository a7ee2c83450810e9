//! Storage abstraction layer for the Vigil monitoring backend.
//!
//! Resources are persisted as [`Wrapper`] envelopes: an encoded, optionally
//! compressed payload tagged with its [`TypeMeta`](vigil_types::TypeMeta).
//! Backends implement the [`Store`] contract against [`ResourceRequest`]
//! addresses and never see concrete resource types.
//!
//! # Key Types
//!
//! - [`Store`] -- Backend contract: conditional writes, reads, lists, patches
//! - [`Wrapper`] -- Type-tagged, encoded, compressed resource envelope
//! - [`TypedStore`] -- Compile-time-typed façade bound to one resource type
//! - [`StoreProxy`] -- Delegate whose backend can be replaced at runtime
//! - [`InMemoryStore`] -- `BTreeMap`-backed store for tests and embedding
//! - [`ETag`] / [`ETagCondition`] -- Optimistic concurrency preconditions
//! - [`Context`] -- Cancellation, preconditions, and transaction reporting
//!
//! # Design Rules
//!
//! 1. Every operation validates its request before touching the backend.
//! 2. A broken backend reports `Internal`, never `NotFound` or `AlreadyExists`.
//! 3. Decoding always yields a new value; callers never share storage.
//! 4. No lock is held across an `.await` except the proxy's read guard.

pub mod context;
pub mod error;
pub mod etag;
pub mod generic;
pub mod memory;
pub mod patch;
pub mod proxy;
pub mod request;
pub mod traits;
pub mod wrapper;

#[cfg(test)]
mod testing;

pub use context::{Context, TxInfoHandle};
pub use error::{PatchError, RequestError, StoreError, StoreResult, WrapError};
pub use etag::{
    parse_if_match, parse_if_none_match, ETag, ETagCondition, IfMatch, IfNoneMatch, TxInfo,
    TxRecordInfo,
};
pub use generic::{ListPage, ResourceId, TypedStore};
pub use memory::InMemoryStore;
pub use patch::{JsonPatch, MergePatch};
pub use proxy::StoreProxy;
pub use request::{ResourceRequest, SortOrder};
pub use traits::{Patcher, SelectionPredicate, Store};
pub use wrapper::{Compression, EncodingPreference, WrapList, WrapOptions, Wrapper};
