//! Resource fixtures shared by the unit tests of this crate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vigil_types::{ObjectMeta, Resource, TypeError, TypeMeta, TypeRegistry};

/// Binary-encodable check definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    pub metadata: ObjectMeta,
    pub command: String,
    pub interval: u32,
    pub subscriptions: Vec<String>,
}

impl Resource for CheckConfig {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn store_name() -> &'static str {
        "checks"
    }

    fn type_meta() -> TypeMeta {
        TypeMeta::new("CheckConfig", "core/v2")
    }

    fn validate(&self) -> Result<(), TypeError> {
        self.metadata.validate()?;
        if self.interval == 0 {
            return Err(TypeError::Validation("interval must be positive".into()));
        }
        Ok(())
    }

    fn binary_encodable() -> bool {
        true
    }
}

/// JSON-only entity: sparse fields make it unsuitable for bincode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub metadata: ObjectMeta,
    pub entity_class: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub system: BTreeMap<String, String>,
}

impl Resource for Entity {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn store_name() -> &'static str {
        "entities"
    }

    fn type_meta() -> TypeMeta {
        TypeMeta::new("Entity", "core/v3")
    }
}

pub fn check(name: &str) -> CheckConfig {
    CheckConfig {
        metadata: ObjectMeta::new("default", name),
        command: format!("check-{name}.sh"),
        interval: 60,
        subscriptions: vec!["linux".into()],
    }
}

pub fn entity(name: &str) -> Entity {
    Entity {
        metadata: ObjectMeta::new("default", name),
        entity_class: "agent".into(),
        system: BTreeMap::new(),
    }
}

pub fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register::<CheckConfig>().register::<Entity>();
    registry
}
