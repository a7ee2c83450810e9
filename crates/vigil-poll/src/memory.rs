//! Manual-clock in-memory [`Table`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use vigil_store::Context;

use crate::table::{Row, Table, TableError};

#[derive(Debug)]
struct TableState<P> {
    now: DateTime<Utc>,
    rows: BTreeMap<String, Row<P>>,
    queries: usize,
    fail_next: Option<String>,
}

/// In-memory table whose clock only moves when told to.
///
/// Writes stamp rows with the current manual clock. Wrap it in an `Arc` to
/// keep writing while a [`Poller`](crate::Poller) owns it.
#[derive(Debug)]
pub struct MemoryTable<P> {
    state: Mutex<TableState<P>>,
}

impl<P: Clone> MemoryTable<P> {
    /// Create an empty table whose clock reads `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(TableState {
                now,
                rows: BTreeMap::new(),
                queries: 0,
                fail_next: None,
            }),
        }
    }

    /// Move the clock to `now`. It may go backwards.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.state.lock().expect("lock poisoned").now = now;
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.state.lock().expect("lock poisoned").now += by;
    }

    /// Current clock reading.
    pub fn now_value(&self) -> DateTime<Utc> {
        self.state.lock().expect("lock poisoned").now
    }

    /// Insert a new row created and updated at the current clock.
    pub fn insert(&self, id: impl Into<String>, resource: P) {
        let mut state = self.state.lock().expect("lock poisoned");
        let now = state.now;
        let id = id.into();
        state.rows.insert(
            id.clone(),
            Row {
                id,
                created_at: now,
                updated_at: now,
                deleted_at: None,
                resource,
            },
        );
    }

    /// Replace the payload of an existing row. Returns `false` if absent.
    pub fn update(&self, id: &str, resource: P) -> bool {
        let mut state = self.state.lock().expect("lock poisoned");
        let now = state.now;
        match state.rows.get_mut(id) {
            Some(row) => {
                row.updated_at = now;
                row.resource = resource;
                true
            }
            None => false,
        }
    }

    /// Mark a row deleted at the current clock. Returns `false` if absent.
    pub fn soft_delete(&self, id: &str) -> bool {
        let mut state = self.state.lock().expect("lock poisoned");
        let now = state.now;
        match state.rows.get_mut(id) {
            Some(row) => {
                row.updated_at = now;
                row.deleted_at = Some(now);
                true
            }
            None => false,
        }
    }

    /// Store `row` verbatim, timestamps included.
    pub fn upsert(&self, row: Row<P>) {
        self.state
            .lock()
            .expect("lock poisoned")
            .rows
            .insert(row.id.clone(), row);
    }

    /// Make the next `now` or `since` call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().expect("lock poisoned").fail_next = Some(message.into());
    }

    /// Number of `since` queries served so far.
    pub fn query_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").queries
    }

    /// Number of rows, soft-deleted ones included.
    pub fn len(&self) -> usize {
        self.state.lock().expect("lock poisoned").rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<P> Table for MemoryTable<P>
where
    P: Clone + PartialEq + Send + Sync + 'static,
{
    type Payload = P;

    async fn now(&self, ctx: &Context) -> Result<DateTime<Utc>, TableError> {
        if ctx.is_cancelled() {
            return Err("context cancelled".into());
        }
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(message) = state.fail_next.take() {
            return Err(message.into());
        }
        Ok(state.now)
    }

    async fn since(&self, ctx: &Context, at: DateTime<Utc>) -> Result<Vec<Row<P>>, TableError> {
        if ctx.is_cancelled() {
            return Err("context cancelled".into());
        }
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(message) = state.fail_next.take() {
            return Err(message.into());
        }
        state.queries += 1;
        let mut rows: Vec<Row<P>> = state
            .rows
            .values()
            .filter(|row| row.updated_at >= at)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }
}
