//! ETags and the conditional-request primitives built on them.
//!
//! An [`ETag`] is an opaque content digest. Equality is exact byte equality.
//! On the wire it is the unpadded standard base64 of its bytes, quoted and
//! comma-separated in `If-Match` / `If-None-Match` style headers.

use std::fmt;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use vigil_types::TypeError;

use crate::error::{StoreError, StoreResult};

const ETAG_DOMAIN: &str = "vigil-etag-v1";

/// Opaque content digest used for optimistic concurrency.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ETag(Vec<u8>);

impl ETag {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Digest of raw bytes: domain-separated BLAKE3 truncated to a
    /// little-endian `u64`.
    pub fn for_payload(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ETAG_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        Self(head.to_vec())
    }

    /// Structural digest of a value, for backends that do not compute ETags.
    ///
    /// The value is hashed in canonical JSON form (object keys sorted), so
    /// equal values give equal ETags regardless of map iteration order.
    pub fn from_struct<T: Serialize + ?Sized>(value: &T) -> Result<Self, TypeError> {
        let canonical =
            serde_json::to_value(value).map_err(|e| TypeError::Serialization(e.to_string()))?;
        let bytes =
            serde_json::to_vec(&canonical).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(Self::for_payload(&bytes))
    }

    /// Decode the unpadded base64 form produced by `Display`.
    pub fn decode(s: &str) -> Result<Self, base64::DecodeError> {
        STANDARD_NO_PAD.decode(s).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD_NO_PAD.encode(&self.0))
    }
}

impl fmt::Debug for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ETag({self})")
    }
}

/// Precondition satisfied when the current ETag is one of the listed ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IfMatch(pub Vec<ETag>);

impl IfMatch {
    pub fn matches(&self, etag: &ETag) -> bool {
        self.0.iter().any(|candidate| candidate == etag)
    }
}

/// Precondition satisfied when the current ETag is none of the listed ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IfNoneMatch(pub Vec<ETag>);

impl IfNoneMatch {
    pub fn matches(&self, etag: &ETag) -> bool {
        !self.0.iter().any(|candidate| candidate == etag)
    }
}

/// Parse an `If-Match` header value. Malformed members are skipped.
pub fn parse_if_match(header: &str) -> IfMatch {
    IfMatch(parse_etag_list(header))
}

/// Parse an `If-None-Match` header value. Malformed members are skipped.
pub fn parse_if_none_match(header: &str) -> IfNoneMatch {
    IfNoneMatch(parse_etag_list(header))
}

fn parse_etag_list(header: &str) -> Vec<ETag> {
    header
        .split(',')
        .filter_map(|member| {
            let token = member.trim().trim_matches('"');
            if token.is_empty() {
                return None;
            }
            ETag::decode(token).ok()
        })
        .collect()
}

/// The preconditions a conditional write must satisfy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ETagCondition {
    pub if_match: Option<IfMatch>,
    pub if_none_match: Option<IfNoneMatch>,
}

impl ETagCondition {
    pub fn if_match(tags: impl IntoIterator<Item = ETag>) -> Self {
        Self {
            if_match: Some(IfMatch(tags.into_iter().collect())),
            if_none_match: None,
        }
    }

    pub fn if_none_match(tags: impl IntoIterator<Item = ETag>) -> Self {
        Self {
            if_match: None,
            if_none_match: Some(IfNoneMatch(tags.into_iter().collect())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.if_match.is_none() && self.if_none_match.is_none()
    }

    /// Evaluate against the current ETag, `None` if the resource is absent.
    ///
    /// A present `IfMatch` requires an existing resource. A present
    /// `IfNoneMatch` always accepts an absent one.
    pub fn is_satisfied_by(&self, current: Option<&ETag>) -> bool {
        if let Some(if_match) = &self.if_match {
            match current {
                Some(etag) if if_match.matches(etag) => {}
                _ => return false,
            }
        }
        if let (Some(if_none_match), Some(etag)) = (&self.if_none_match, current) {
            if !if_none_match.matches(etag) {
                return false;
            }
        }
        true
    }

    /// Like [`is_satisfied_by`](Self::is_satisfied_by), as a store result.
    pub fn check(&self, key: &str, current: Option<&ETag>) -> StoreResult<()> {
        if self.is_satisfied_by(current) {
            Ok(())
        } else {
            Err(StoreError::PreconditionFailed(key.to_string()))
        }
    }
}

/// Outcome of a write for one affected record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxRecordInfo {
    pub created: bool,
    pub updated: bool,
    pub deleted: bool,
    /// ETag after the write. `None` for deletions.
    pub etag: Option<ETag>,
    /// ETag before the write. `None` if the record did not exist.
    pub prev_etag: Option<ETag>,
}

/// Per-call ledger of write outcomes, filled in by the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxInfo {
    pub records: Vec<TxRecordInfo>,
}

impl TxInfo {
    pub fn created(&self) -> usize {
        self.records.iter().filter(|r| r.created).count()
    }

    pub fn updated(&self) -> usize {
        self.records.iter().filter(|r| r.updated).count()
    }

    pub fn deleted(&self) -> usize {
        self.records.iter().filter(|r| r.deleted).count()
    }

    pub fn last(&self) -> Option<&TxRecordInfo> {
        self.records.last()
    }
}
