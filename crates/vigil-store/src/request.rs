use std::fmt;

use serde::{Deserialize, Serialize};
use vigil_types::{Resource, TypeMeta};

use crate::error::RequestError;

/// Requested ordering of list results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Backend order.
    #[default]
    None,
    Ascend,
    Descend,
}

/// Backend-agnostic address of a resource or a collection of resources.
///
/// `store_name`, `type_meta.type_name` and `type_meta.api_version` are
/// mandatory. `namespace` and `name` may be empty for collection-scoped
/// operations such as list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub type_meta: TypeMeta,
    pub namespace: String,
    pub name: String,
    pub store_name: String,
    pub sort_order: SortOrder,
}

impl ResourceRequest {
    /// Create a request with no sort order.
    pub fn new(
        type_meta: TypeMeta,
        namespace: impl Into<String>,
        name: impl Into<String>,
        store_name: impl Into<String>,
    ) -> Self {
        Self {
            type_meta,
            namespace: namespace.into(),
            name: name.into(),
            store_name: store_name.into(),
            sort_order: SortOrder::None,
        }
    }

    /// Address a resource from its own metadata and type.
    pub fn from_resource<R: Resource>(resource: &R) -> Self {
        let meta = resource.metadata();
        Self::new(R::type_meta(), &meta.namespace, &meta.name, R::store_name())
    }

    /// Address a resource of type `R` by namespace and name.
    pub fn for_type<R: Resource>(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(R::type_meta(), namespace, name, R::store_name())
    }

    /// Order applied by list operations.
    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Check that the mandatory fields are set.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.store_name.is_empty() {
            return Err(RequestError::MissingStoreName);
        }
        if self.type_meta.type_name.is_empty() {
            return Err(RequestError::MissingTypeName);
        }
        if self.type_meta.api_version.is_empty() {
            return Err(RequestError::MissingApiVersion);
        }
        Ok(())
    }
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.store_name, self.namespace, self.name)
    }
}
