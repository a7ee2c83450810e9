use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{PatchError, StoreResult};
use crate::etag::ETagCondition;
use crate::request::ResourceRequest;
use crate::wrapper::{WrapList, Wrapper};

/// Storage backend for wrapped resources.
///
/// Backends only see [`ResourceRequest`]s and [`Wrapper`]s, never concrete
/// resource types. Implementations must satisfy these rules:
/// - Safe for concurrent use by independent callers (`Send + Sync`).
/// - Every operation validates its request first.
/// - Writes honour the `If-Match` / `If-None-Match` values carried by the
///   [`Context`] and report one record per affected resource into its TxInfo.
/// - A non-functional backend answers `StoreError::Internal`, never
///   `NotFound` or `AlreadyExists`.
/// - No ordering is imposed across different resources; consistency for a
///   single resource is the backend's transaction semantics plus ETag
///   preconditions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Unconditional upsert.
    async fn create_or_update(&self, ctx: &Context, req: &ResourceRequest, wrapper: &Wrapper) -> StoreResult<()>;

    /// Update an existing resource. `NotFound` if it does not exist.
    async fn update_if_exists(&self, ctx: &Context, req: &ResourceRequest, wrapper: &Wrapper) -> StoreResult<()>;

    /// Create a new resource. `AlreadyExists` if it exists.
    async fn create_if_not_exists(&self, ctx: &Context, req: &ResourceRequest, wrapper: &Wrapper) -> StoreResult<()>;

    /// Read a resource. `NotFound` if it does not exist.
    async fn get(&self, ctx: &Context, req: &ResourceRequest) -> StoreResult<Wrapper>;

    /// Delete a resource. `NotFound` if it does not exist.
    async fn delete(&self, ctx: &Context, req: &ResourceRequest) -> StoreResult<()>;

    /// List the collection addressed by `req`, honouring its sort order.
    async fn list(&self, ctx: &Context, req: &ResourceRequest, pred: &SelectionPredicate) -> StoreResult<WrapList>;

    /// Existence check. Absence is `Ok(false)`, not an error.
    async fn exists(&self, ctx: &Context, req: &ResourceRequest) -> StoreResult<bool>;

    /// Apply `patcher` to the current value if its ETag satisfies
    /// `condition` (or the context's preconditions when `None`). Returns the
    /// stored result. `PreconditionFailed` if the condition does not hold.
    async fn patch(
        &self,
        ctx: &Context,
        req: &ResourceRequest,
        patcher: &dyn Patcher,
        condition: Option<&ETagCondition>,
    ) -> StoreResult<Wrapper>;
}

/// Transforms the JSON form of a resource.
pub trait Patcher: Send + Sync {
    fn patch(&self, original: &[u8]) -> Result<Vec<u8>, PatchError>;
}

/// Selection and pagination for list operations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPredicate {
    /// Opaque token from a previous page, empty for the first page.
    pub continue_token: String,
    /// Maximum number of items per page. `None` returns everything.
    pub limit: Option<usize>,
    /// Only resources carrying all of these labels are returned.
    pub label_selector: BTreeMap<String, String>,
}

impl SelectionPredicate {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_continue(mut self, token: impl Into<String>) -> Self {
        self.continue_token = token.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.label_selector.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if `labels` carries every selected label.
    pub fn matches_labels(&self, labels: &BTreeMap<String, String>) -> bool {
        self.label_selector
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

/// Position a continue token points after: `(namespace, name)`.
///
/// The pair is JSON-encoded before base64, so neither part needs escaping.
pub(crate) fn encode_continue(namespace: &str, name: &str) -> String {
    let cursor = serde_json::to_vec(&(namespace, name)).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(cursor)
}

/// Inverse of [`encode_continue`]. `None` for malformed tokens.
pub(crate) fn decode_continue(token: &str) -> Option<(String, String)> {
    let raw = URL_SAFE_NO_PAD.decode(token).ok()?;
    serde_json::from_slice(&raw).ok()
}
