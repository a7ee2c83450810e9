//! Compile-time-typed façade over a [`Store`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use vigil_types::{Resource, TypeMeta};

use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::etag::ETagCondition;
use crate::request::{ResourceRequest, SortOrder};
use crate::traits::{Patcher, SelectionPredicate, Store};
use crate::wrapper::{WrapOptions, Wrapper};

/// Namespace + name of a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    /// Id of a namespaced resource.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Id of a resource that is not scoped to a namespace.
    pub fn global(name: impl Into<String>) -> Self {
        Self::new("", name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One page of typed list results.
#[derive(Clone, Debug, PartialEq)]
pub struct ListPage<R> {
    pub items: Vec<R>,
    pub continue_token: Option<String>,
}

/// Store bound to the resource type `R`.
///
/// Type meta and store name are computed once at construction. Every call
/// builds the [`ResourceRequest`] / [`Wrapper`] pair itself and decodes
/// results into new `R` values.
pub struct TypedStore<R: Resource> {
    store: Arc<dyn Store>,
    type_meta: TypeMeta,
    store_name: &'static str,
    options: WrapOptions,
    sort_order: SortOrder,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> TypedStore<R> {
    /// Create a typed store with the default wrap options.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_options(store, WrapOptions::default())
    }

    /// Create a typed store that wraps every write with `options`.
    pub fn with_options(store: Arc<dyn Store>, options: WrapOptions) -> Self {
        Self {
            store,
            type_meta: R::type_meta(),
            store_name: R::store_name(),
            options,
            sort_order: SortOrder::None,
            _resource: PhantomData,
        }
    }

    /// Order applied to [`list`](Self::list).
    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    fn request(&self, namespace: &str, name: &str) -> ResourceRequest {
        ResourceRequest::new(self.type_meta.clone(), namespace, name, self.store_name)
            .with_sort_order(self.sort_order)
    }

    fn prepare(&self, resource: &R) -> StoreResult<(ResourceRequest, Wrapper)> {
        resource.validate().map_err(StoreError::Validation)?;
        let meta = resource.metadata();
        let req = self.request(&meta.namespace, &meta.name);
        let wrapper = Wrapper::wrap(resource, &self.options)?;
        Ok((req, wrapper))
    }

    /// Validate and upsert `resource`.
    pub async fn create_or_update(&self, ctx: &Context, resource: &R) -> StoreResult<()> {
        let (req, wrapper) = self.prepare(resource)?;
        self.store.create_or_update(ctx, &req, &wrapper).await
    }

    /// Validate and replace `resource`. `NotFound` if it does not exist.
    pub async fn update_if_exists(&self, ctx: &Context, resource: &R) -> StoreResult<()> {
        let (req, wrapper) = self.prepare(resource)?;
        self.store.update_if_exists(ctx, &req, &wrapper).await
    }

    /// Validate and create `resource`. `AlreadyExists` if it exists.
    pub async fn create_if_not_exists(&self, ctx: &Context, resource: &R) -> StoreResult<()> {
        let (req, wrapper) = self.prepare(resource)?;
        self.store.create_if_not_exists(ctx, &req, &wrapper).await
    }

    /// Read and decode the resource at `id`.
    pub async fn get(&self, ctx: &Context, id: &ResourceId) -> StoreResult<R> {
        let req = self.request(&id.namespace, &id.name);
        let wrapper = self.store.get(ctx, &req).await?;
        Ok(wrapper.unwrap_into::<R>()?)
    }

    /// Delete the resource at `id`. `NotFound` if it does not exist.
    pub async fn delete(&self, ctx: &Context, id: &ResourceId) -> StoreResult<()> {
        let req = self.request(&id.namespace, &id.name);
        self.store.delete(ctx, &req).await
    }

    /// List resources in `namespace`, or across all namespaces when empty.
    pub async fn list(
        &self,
        ctx: &Context,
        namespace: &str,
        pred: &SelectionPredicate,
    ) -> StoreResult<ListPage<R>> {
        let req = self.request(namespace, "");
        let list = self.store.list(ctx, &req, pred).await?;
        Ok(ListPage {
            items: list.unwrap_into::<R>()?,
            continue_token: list.continue_token,
        })
    }

    /// Whether a resource exists at `id`.
    pub async fn exists(&self, ctx: &Context, id: &ResourceId) -> StoreResult<bool> {
        let req = self.request(&id.namespace, &id.name);
        self.store.exists(ctx, &req).await
    }

    /// Patch the resource at `id` under `condition` and return the stored
    /// result.
    pub async fn patch(
        &self,
        ctx: &Context,
        id: &ResourceId,
        patcher: &dyn Patcher,
        condition: Option<&ETagCondition>,
    ) -> StoreResult<R> {
        let req = self.request(&id.namespace, &id.name);
        let wrapper = self.store.patch(ctx, &req, patcher, condition).await?;
        Ok(wrapper.unwrap_into::<R>()?)
    }
}

impl<R: Resource> Clone for TypedStore<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            type_meta: self.type_meta.clone(),
            store_name: self.store_name,
            options: self.options,
            sort_order: self.sort_order,
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> fmt::Debug for TypedStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedStore")
            .field("type_meta", &self.type_meta)
            .field("store_name", &self.store_name)
            .field("options", &self.options)
            .finish()
    }
}
