use chrono::{DateTime, Utc};

use crate::table::TableError;

/// Errors from the polling change feed.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// `next` was called before `initialize`.
    #[error("poller has not been initialized")]
    NotInitialized,

    /// The context was cancelled while waiting. No query was issued.
    #[error("poll cancelled")]
    Cancelled,

    #[error("failed to read table clock: {0}")]
    Now(#[source] TableError),

    #[error("query since {watermark} failed: {source}")]
    Query {
        watermark: DateTime<Utc>,
        #[source]
        source: TableError,
    },

    #[error("invalid poller config: {0}")]
    Config(String),
}

/// Result alias for poller operations.
pub type PollResult<T> = Result<T, PollError>;
