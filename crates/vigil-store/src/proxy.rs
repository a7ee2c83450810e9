//! Hot-swappable store delegate.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::context::Context;
use crate::error::StoreResult;
use crate::etag::ETagCondition;
use crate::request::ResourceRequest;
use crate::traits::{Patcher, SelectionPredicate, Store};
use crate::wrapper::{WrapList, Wrapper};

/// A [`Store`] that forwards every call to a replaceable backend.
///
/// Each delegated call holds a read guard for its full duration.
/// [`update_store`](Self::update_store) takes the write guard, so it waits
/// for in-flight calls to drain, and calls issued after the swap started
/// queue behind it and reach the new backend.
pub struct StoreProxy {
    inner: RwLock<Arc<dyn Store>>,
}

impl StoreProxy {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            inner: RwLock::new(store),
        }
    }

    /// Replace the backend.
    ///
    /// # Panics
    ///
    /// If `store` is this proxy itself. Delegating to itself would deadlock
    /// on the first call.
    pub async fn update_store(&self, store: Arc<dyn Store>) {
        let self_ptr = self as *const Self as *const ();
        let new_ptr = Arc::as_ptr(&store) as *const ();
        assert!(
            self_ptr != new_ptr,
            "a store proxy cannot delegate to itself"
        );

        let mut guard = self.inner.write().await;
        *guard = store;
        info!("store proxy backend replaced");
    }

    /// The backend currently delegated to.
    pub async fn current(&self) -> Arc<dyn Store> {
        Arc::clone(&*self.inner.read().await)
    }
}

impl std::fmt::Debug for StoreProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreProxy").finish_non_exhaustive()
    }
}

#[async_trait]
impl Store for StoreProxy {
    async fn create_or_update(&self, ctx: &Context, req: &ResourceRequest, wrapper: &Wrapper) -> StoreResult<()> {
        let store = self.inner.read().await;
        store.create_or_update(ctx, req, wrapper).await
    }

    async fn update_if_exists(&self, ctx: &Context, req: &ResourceRequest, wrapper: &Wrapper) -> StoreResult<()> {
        let store = self.inner.read().await;
        store.update_if_exists(ctx, req, wrapper).await
    }

    async fn create_if_not_exists(&self, ctx: &Context, req: &ResourceRequest, wrapper: &Wrapper) -> StoreResult<()> {
        let store = self.inner.read().await;
        store.create_if_not_exists(ctx, req, wrapper).await
    }

    async fn get(&self, ctx: &Context, req: &ResourceRequest) -> StoreResult<Wrapper> {
        let store = self.inner.read().await;
        store.get(ctx, req).await
    }

    async fn delete(&self, ctx: &Context, req: &ResourceRequest) -> StoreResult<()> {
        let store = self.inner.read().await;
        store.delete(ctx, req).await
    }

    async fn list(&self, ctx: &Context, req: &ResourceRequest, pred: &SelectionPredicate) -> StoreResult<WrapList> {
        let store = self.inner.read().await;
        store.list(ctx, req, pred).await
    }

    async fn exists(&self, ctx: &Context, req: &ResourceRequest) -> StoreResult<bool> {
        let store = self.inner.read().await;
        store.exists(ctx, req).await
    }

    async fn patch(
        &self,
        ctx: &Context,
        req: &ResourceRequest,
        patcher: &dyn Patcher,
        condition: Option<&ETagCondition>,
    ) -> StoreResult<Wrapper> {
        let store = self.inner.read().await;
        store.patch(ctx, req, patcher, condition).await
    }
}
