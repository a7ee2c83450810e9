use std::any::Any;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{self, Encoding};
use crate::error::TypeError;
use crate::meta::{ObjectMeta, TypeMeta};

/// A persisted, typed, validated domain object identified by namespace + name.
///
/// Only [`metadata`](Resource::metadata), [`metadata_mut`](Resource::metadata_mut)
/// and [`store_name`](Resource::store_name) are required. Everything else has
/// a default that implementations override when they need to.
pub trait Resource:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Stable collection name the backend files this type under.
    fn store_name() -> &'static str;

    /// Logical type name and version. Derived from the type path unless
    /// overridden.
    fn type_meta() -> TypeMeta {
        TypeMeta::derive::<Self>()
    }

    /// Name used by authorization rules.
    fn rbac_name() -> &'static str {
        Self::store_name()
    }

    /// Canonical API path of this resource.
    fn uri_path(&self) -> String {
        let meta = self.metadata();
        let api_version = Self::type_meta().api_version;
        if meta.namespace.is_empty() {
            format!("/api/{api_version}/{}/{}", Self::rbac_name(), meta.name)
        } else {
            format!(
                "/api/{api_version}/namespaces/{}/{}/{}",
                meta.namespace,
                Self::rbac_name(),
                meta.name
            )
        }
    }

    fn validate(&self) -> Result<(), TypeError> {
        self.metadata().validate()
    }

    /// Whether the binary encoding can represent this type.
    ///
    /// bincode is not self-describing: types using `skip_serializing_if`,
    /// untagged enums or `serde_json::Value` fields must leave this `false`.
    fn binary_encodable() -> bool {
        false
    }
}

/// Object-safe view of a [`Resource`].
///
/// Produced by [`TypeRegistry`](crate::TypeRegistry) when the concrete type
/// is only known at runtime. Method names differ from `Resource` so both
/// traits can be in scope without ambiguity.
pub trait DynResource: fmt::Debug + Send + Sync + 'static {
    fn object_meta(&self) -> &ObjectMeta;

    fn resource_type(&self) -> TypeMeta;

    fn resource_store_name(&self) -> &'static str;

    fn supports_binary(&self) -> bool;

    fn validate_resource(&self) -> Result<(), TypeError>;

    fn encode(&self, encoding: Encoding) -> Result<Vec<u8>, TypeError>;

    fn to_json_value(&self) -> Result<serde_json::Value, TypeError>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<R: Resource> DynResource for R {
    fn object_meta(&self) -> &ObjectMeta {
        self.metadata()
    }

    fn resource_type(&self) -> TypeMeta {
        R::type_meta()
    }

    fn resource_store_name(&self) -> &'static str {
        R::store_name()
    }

    fn supports_binary(&self) -> bool {
        R::binary_encodable()
    }

    fn validate_resource(&self) -> Result<(), TypeError> {
        self.validate()
    }

    fn encode(&self, encoding: Encoding) -> Result<Vec<u8>, TypeError> {
        codec::encode(self, encoding)
    }

    fn to_json_value(&self) -> Result<serde_json::Value, TypeError> {
        serde_json::to_value(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl dyn DynResource {
    /// Borrow the concrete resource if it is an `R`.
    pub fn downcast_ref<R: Resource>(&self) -> Option<&R> {
        self.as_any().downcast_ref::<R>()
    }

    /// Take ownership of the concrete resource if it is an `R`.
    pub fn downcast<R: Resource>(self: Box<Self>) -> Result<R, TypeError> {
        let found = self.resource_type();
        self.into_any()
            .downcast::<R>()
            .map(|boxed| *boxed)
            .map_err(|_| {
                TypeError::Validation(format!("expected {}, found {found}", R::type_meta()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Silence {
        metadata: ObjectMeta,
        reason: String,
    }

    impl Resource for Silence {
        fn metadata(&self) -> &ObjectMeta {
            &self.metadata
        }

        fn metadata_mut(&mut self) -> &mut ObjectMeta {
            &mut self.metadata
        }

        fn store_name() -> &'static str {
            "silenced"
        }

        fn type_meta() -> TypeMeta {
            TypeMeta::new("Silenced", "core/v2")
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Namespace {
        metadata: ObjectMeta,
    }

    impl Resource for Namespace {
        fn metadata(&self) -> &ObjectMeta {
            &self.metadata
        }

        fn metadata_mut(&mut self) -> &mut ObjectMeta {
            &mut self.metadata
        }

        fn store_name() -> &'static str {
            "namespaces"
        }
    }

    fn silence() -> Silence {
        Silence {
            metadata: ObjectMeta::new("default", "maintenance"),
            reason: "patching".into(),
        }
    }

    #[test]
    fn explicit_type_meta_wins_over_derivation() {
        assert_eq!(Silence::type_meta(), TypeMeta::new("Silenced", "core/v2"));
        assert_eq!(Namespace::type_meta().type_name, "Namespace");
    }

    #[test]
    fn namespaced_uri_path() {
        assert_eq!(
            silence().uri_path(),
            "/api/core/v2/namespaces/default/silenced/maintenance"
        );
    }

    #[test]
    fn global_uri_path_skips_namespace() {
        let ns = Namespace { metadata: ObjectMeta::global("dev") };
        let path = ns.uri_path();
        assert!(path.ends_with("/namespaces/dev"));
        assert!(!path.contains("namespaces//"));
    }

    #[test]
    fn rbac_name_defaults_to_store_name() {
        assert_eq!(Silence::rbac_name(), "silenced");
    }

    #[test]
    fn default_validation_checks_metadata() {
        let mut s = silence();
        assert!(s.validate().is_ok());
        s.metadata_mut().name.clear();
        assert!(s.validate().is_err());
    }

    #[test]
    fn dyn_view_downcasts_back() {
        let boxed: Box<dyn DynResource> = Box::new(silence());
        assert_eq!(boxed.resource_type(), Silence::type_meta());
        assert_eq!(boxed.resource_store_name(), "silenced");
        assert!(boxed.downcast_ref::<Namespace>().is_none());
        let back = boxed.downcast::<Silence>().unwrap();
        assert_eq!(back, silence());
    }

    #[test]
    fn downcast_to_wrong_type_fails() {
        let boxed: Box<dyn DynResource> = Box::new(silence());
        assert!(boxed.downcast::<Namespace>().is_err());
    }
}
