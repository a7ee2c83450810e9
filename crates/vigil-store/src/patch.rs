//! JSON patchers applied by [`Store::patch`](crate::Store::patch).

use serde_json::Value;

use crate::error::PatchError;
use crate::traits::Patcher;

/// JSON Merge Patch (RFC 7386).
#[derive(Clone, Debug, PartialEq)]
pub struct MergePatch {
    document: Value,
}

impl MergePatch {
    pub fn new(document: Value) -> Self {
        Self { document }
    }
}

impl Patcher for MergePatch {
    fn patch(&self, original: &[u8]) -> Result<Vec<u8>, PatchError> {
        let mut value = parse(original)?;
        json_patch::merge(&mut value, &self.document);
        serde_json::to_vec(&value).map_err(|e| PatchError::Json(e.to_string()))
    }
}

/// JSON Patch (RFC 6902).
#[derive(Clone, Debug, PartialEq)]
pub struct JsonPatch {
    operations: json_patch::Patch,
}

impl JsonPatch {
    pub fn new(operations: json_patch::Patch) -> Self {
        Self { operations }
    }

    /// Parse a patch document such as `[{"op": "replace", ...}]`.
    pub fn from_value(document: Value) -> Result<Self, PatchError> {
        let operations = serde_json::from_value(document)
            .map_err(|e| PatchError::InvalidDocument(e.to_string()))?;
        Ok(Self { operations })
    }
}

impl Patcher for JsonPatch {
    fn patch(&self, original: &[u8]) -> Result<Vec<u8>, PatchError> {
        let mut value = parse(original)?;
        json_patch::patch(&mut value, &self.operations)
            .map_err(|e| PatchError::Apply(e.to_string()))?;
        serde_json::to_vec(&value).map_err(|e| PatchError::Json(e.to_string()))
    }
}

fn parse(original: &[u8]) -> Result<Value, PatchError> {
    serde_json::from_slice(original).map_err(|e| PatchError::Json(e.to_string()))
}
