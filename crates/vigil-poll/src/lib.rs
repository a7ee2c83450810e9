//! Polling change feed for Vigil backends that cannot watch natively.
//!
//! A backend exposes the two-call [`Table`] contract (`now`, `since`). The
//! [`Poller`] re-scans a trailing transaction window on every tick and
//! de-duplicates against its own cache, turning plain scans into classified
//! [`RowChange`]s. The [`Watcher`] runs a poller on a tokio task and streams
//! [`WatchEvent`]s.
//!
//! # Key Types
//!
//! - [`Table`] -- Two-call query contract a pollable backend implements
//! - [`Poller`] -- Watermark, window re-scan, and de-duplication state machine
//! - [`RowChange`] -- A kept row classified as create, update, or delete
//! - [`Watcher`] -- Tokio task streaming a poller's output as [`WatchEvent`]s
//! - [`MemoryTable`] -- Manual-clock table for tests and embedding
//! - [`PollerConfig`] -- Interval and transaction window, loadable from TOML
//!
//! # Design Rules
//!
//! 1. A poller has one owner; `next` takes `&mut self`.
//! 2. Cancellation while waiting issues no query and mutates no state.
//! 3. Deletion is checked before the create/update distinction.
//! 4. The watermark only moves forward.
//! 5. Table failures are returned with the watermark they were issued against.
//!
//! # Clock precondition
//!
//! `Table::now` and `Table::since` must read one consistent clock and
//! commit-visibility source. If they diverge by more than the transaction
//! window, updates can be skipped. The poller does not detect this.

pub mod config;
pub mod error;
pub mod memory;
pub mod poller;
pub mod table;
pub mod watcher;

pub use config::{PollerConfig, WatcherConfig, MAX_DURATION_MS};
pub use error::{PollError, PollResult};
pub use memory::MemoryTable;
pub use poller::Poller;
pub use table::{ChangeKind, Row, RowChange, Table, TableError};
pub use watcher::{WatchAction, WatchEvent, Watcher};
