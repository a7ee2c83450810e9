use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Logical type name and API version of a resource.
///
/// Together they identify a resource type across the wire and at rest,
/// independently of the Rust type that implements it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeMeta {
    pub type_name: String,
    pub api_version: String,
}

impl TypeMeta {
    pub fn new(type_name: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            api_version: api_version.into(),
        }
    }

    /// Derive the type meta of `T` from where it is implemented.
    ///
    /// `vigil_core::core::v2::CheckConfig` becomes `CheckConfig` in API
    /// version `core/v2`.
    pub fn derive<T: ?Sized>() -> Self {
        Self::from_type_path(std::any::type_name::<T>())
    }

    /// Parse a `::`-separated Rust type path.
    ///
    /// The last segment is the type name; the (up to) two module segments
    /// before it form the API version. Generic arguments are ignored.
    pub fn from_type_path(path: &str) -> Self {
        let base = path.split('<').next().unwrap_or(path);
        let segments: Vec<&str> = base.split("::").filter(|s| !s.is_empty()).collect();
        match segments.split_last() {
            Some((type_name, modules)) => {
                let start = modules.len().saturating_sub(2);
                Self::new(*type_name, modules[start..].join("/"))
            }
            None => Self::default(),
        }
    }

    /// Returns `true` if both the type name and the API version are set.
    pub fn is_complete(&self) -> bool {
        !self.type_name.is_empty() && !self.api_version.is_empty()
    }
}

impl fmt::Display for TypeMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.api_version, self.type_name)
    }
}

/// Addressing and descriptive metadata carried by every resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Namespace the resource lives in. Empty for cluster-wide resources.
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub created_by: String,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Metadata for a resource that is not scoped to a namespace.
    pub fn global(name: impl Into<String>) -> Self {
        Self::new("", name)
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Check that the name (and namespace, if set) are usable as path segments.
    pub fn validate(&self) -> Result<(), TypeError> {
        validate_segment("name", &self.name)?;
        if !self.namespace.is_empty() {
            validate_segment("namespace", &self.namespace)?;
        }
        Ok(())
    }
}

fn validate_segment(field: &str, value: &str) -> Result<(), TypeError> {
    if value.is_empty() {
        return Err(TypeError::InvalidMetadata(format!("{field} must not be empty")));
    }
    if value.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(TypeError::InvalidMetadata(format!(
            "{field} {value:?} contains whitespace or '/'"
        )));
    }
    Ok(())
}
