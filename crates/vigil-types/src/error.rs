use thiserror::Error;

use crate::meta::TypeMeta;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("type {0} is not registered")]
    UnknownType(TypeMeta),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
