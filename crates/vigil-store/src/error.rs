use vigil_types::{TypeError, TypeMeta};

/// Errors from building or opening a [`Wrapper`](crate::Wrapper).
#[derive(Debug, thiserror::Error)]
pub enum WrapError {
    /// Binary encoding was forced on a type that cannot be binary-encoded.
    #[error("{0} does not support binary encoding")]
    BinaryUnsupported(TypeMeta),

    /// The envelope holds a different type than the one requested.
    #[error("envelope holds {found}, expected {expected}")]
    TypeMismatch { expected: TypeMeta, found: TypeMeta },

    /// Compressing or decompressing the payload failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// Encoding, decoding, or type resolution failed.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// A [`ResourceRequest`](crate::ResourceRequest) is missing a mandatory field.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("resource request has no store name")]
    MissingStoreName,

    #[error("resource request has no type name")]
    MissingTypeName,

    #[error("resource request has no api version")]
    MissingApiVersion,

    #[error("malformed continue token {0:?}")]
    InvalidContinueToken(String),
}

/// Errors raised by a [`Patcher`](crate::Patcher).
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("invalid patch document: {0}")]
    InvalidDocument(String),

    #[error("failed to apply patch: {0}")]
    Apply(String),

    #[error("value is not valid JSON: {0}")]
    Json(String),
}

/// Errors from store operations.
///
/// `NotFound`, `AlreadyExists` and `PreconditionFailed` are ordinary outcomes
/// the caller acts on. `Internal` means the backend itself is not working and
/// must never be reported as one of the former.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// An ETag precondition did not hold (conflict).
    #[error("precondition failed for {0}")]
    PreconditionFailed(String),

    /// The backend is unavailable or failed internally.
    #[error("internal store error: {0}")]
    Internal(String),

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// The resource failed its own validation.
    #[error("invalid resource: {0}")]
    Validation(TypeError),

    #[error(transparent)]
    Wrap(#[from] WrapError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::PreconditionFailed(_))
    }

    /// Returns `true` if the backend is non-functional. Supervisors use this
    /// to back off rather than answer the client.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
