//! Point-in-time query contract consumed by the [`Poller`](crate::Poller).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vigil_store::Context;

/// Boxed backend error returned by a [`Table`].
pub type TableError = Box<dyn std::error::Error + Send + Sync>;

/// One row as seen by a scanning query.
#[derive(Clone, Debug, PartialEq)]
pub struct Row<P> {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set for soft-deleted rows.
    pub deleted_at: Option<DateTime<Utc>>,
    pub resource: P,
}

impl<P> Row<P> {
    /// Classify the row. Deletion wins over the create/update distinction.
    pub fn change_kind(&self) -> ChangeKind {
        if self.deleted_at.is_some() {
            ChangeKind::Delete
        } else if self.created_at == self.updated_at {
            ChangeKind::Create
        } else {
            ChangeKind::Update
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// A classified change reported by [`Poller::next`](crate::Poller::next).
#[derive(Clone, Debug, PartialEq)]
pub struct RowChange<P> {
    pub resource: P,
    pub change: ChangeKind,
}

/// Minimal query surface of a backend that can only be polled.
///
/// `now` and `since` must read the same clock and commit-visibility source.
#[async_trait]
pub trait Table: Send + Sync {
    type Payload: Clone + PartialEq + Send + Sync + 'static;

    /// A timestamp for which `since` would return no rows right now.
    async fn now(&self, ctx: &Context) -> Result<DateTime<Utc>, TableError>;

    /// Every row whose `updated_at` is at or after `at`.
    async fn since(&self, ctx: &Context, at: DateTime<Utc>) -> Result<Vec<Row<Self::Payload>>, TableError>;
}

#[async_trait]
impl<T: Table + ?Sized> Table for std::sync::Arc<T> {
    type Payload = T::Payload;

    async fn now(&self, ctx: &Context) -> Result<DateTime<Utc>, TableError> {
        (**self).now(ctx).await
    }

    async fn since(&self, ctx: &Context, at: DateTime<Utc>) -> Result<Vec<Row<Self::Payload>>, TableError> {
        (**self).since(ctx, at).await
    }
}
