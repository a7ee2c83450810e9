use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;
use vigil_store::Context;

use crate::config::PollerConfig;
use crate::error::{PollError, PollResult};
use crate::table::{Row, RowChange, Table};

#[derive(Debug)]
struct PollState<P> {
    watermark: DateTime<Utc>,
    next_fire: Instant,
    cache: HashMap<String, Row<P>>,
}

/// Turns repeated `Table::since` scans into a change feed.
///
/// Every poll re-queries from the watermark, which trails the newest seen
/// row by the transaction window, and drops rows already reported
/// unchanged. `next` takes `&mut self`: a poller has a single owner.
pub struct Poller<T: Table> {
    table: T,
    interval: Duration,
    txn_window: chrono::Duration,
    state: Option<PollState<T::Payload>>,
}

impl<T: Table> Poller<T> {
    /// Validate `config` and bind it to `table`. Call
    /// [`initialize`](Self::initialize) before polling.
    pub fn new(table: T, config: &PollerConfig) -> PollResult<Self> {
        config.validate()?;
        let txn_window = chrono::Duration::from_std(config.txn_window())
            .map_err(|e| PollError::Config(format!("txn window out of range: {e}")))?;
        Ok(Self {
            table,
            interval: config.interval(),
            txn_window,
            state: None,
        })
    }

    /// Start a session at the table's current time. Clears any cached rows.
    pub async fn initialize(&mut self, ctx: &Context) -> PollResult<()> {
        let watermark = self.table.now(ctx).await.map_err(PollError::Now)?;
        self.state = Some(PollState {
            watermark,
            next_fire: Instant::now() + self.interval,
            cache: HashMap::new(),
        });
        debug!(%watermark, "poller initialized");
        Ok(())
    }

    /// Wait for the next fire time, then report rows that changed since
    /// the previous poll.
    ///
    /// Cancellation while waiting returns [`PollError::Cancelled`] with no
    /// query issued and no state touched.
    pub async fn next(&mut self, ctx: &Context) -> PollResult<Vec<RowChange<T::Payload>>> {
        let state = self.state.as_mut().ok_or(PollError::NotInitialized)?;

        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep_until(state.next_fire) => {}
        }
        state.next_fire += self.interval;

        let watermark = state.watermark;
        let rows = self
            .table
            .since(ctx, watermark)
            .await
            .map_err(|source| PollError::Query { watermark, source })?;

        let kept = merge(&mut state.cache, rows);
        let changes: Vec<_> = kept
            .into_iter()
            .map(|row| RowChange {
                change: row.change_kind(),
                resource: row.resource,
            })
            .collect();

        advance(state, self.txn_window);
        debug!(
            watermark = %state.watermark,
            kept = changes.len(),
            cached = state.cache.len(),
            "poll fired"
        );
        Ok(changes)
    }

    /// Current watermark, `None` before `initialize`.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.state.as_ref().map(|s| s.watermark)
    }

    /// Number of rows held for de-duplication.
    pub fn cached_rows(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.cache.len())
    }

    /// The table being polled.
    pub fn table(&self) -> &T {
        &self.table
    }
}

/// Keep rows that are new or differ from their cached copy in any field.
///
/// Payloads are compared in full, so the cost grows with payload size times
/// the number of rows inside the window.
fn merge<P: Clone + PartialEq>(cache: &mut HashMap<String, Row<P>>, rows: Vec<Row<P>>) -> Vec<Row<P>> {
    let mut kept = Vec::new();
    for row in rows {
        if cache.get(&row.id) == Some(&row) {
            continue;
        }
        cache.insert(row.id.clone(), row.clone());
        kept.push(row);
    }
    kept
}

/// Move the watermark to `max(updated_at) - window` when that is later than
/// the current one, and evict rows that fell behind it. A subtraction that
/// leaves chrono's range keeps the watermark where it is.
fn advance<P>(state: &mut PollState<P>, window: chrono::Duration) {
    let Some(newest) = state.cache.values().map(|row| row.updated_at).max() else {
        return;
    };
    let Some(candidate) = newest.checked_sub_signed(window) else {
        return;
    };
    if candidate > state.watermark {
        state.watermark = candidate;
        let watermark = state.watermark;
        state.cache.retain(|_, row| row.updated_at >= watermark);
    }
}
