//! Call-scoped context: cancellation plus conditional-request values.
//!
//! A [`Context`] travels alongside every store call. Layers above the
//! [`Store`](crate::Store) contract attach `If-Match` / `If-None-Match`
//! preconditions and a [`TxInfoHandle`] to it; backends read the former and
//! report per-record outcomes into the latter. Call signatures do not change
//! when a layer starts using either.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::error::{StoreError, StoreResult};
use crate::etag::{ETagCondition, IfMatch, IfNoneMatch, TxInfo, TxRecordInfo};

/// Shared sink a backend appends write outcomes to.
#[derive(Clone, Debug, Default)]
pub struct TxInfoHandle(Arc<Mutex<TxInfo>>);

impl TxInfoHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: TxRecordInfo) {
        self.0.lock().expect("lock poisoned").records.push(record);
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> TxInfo {
        self.0.lock().expect("lock poisoned").clone()
    }
}

/// Cancellable, call-scoped token carrying optional preconditions.
///
/// Clones share cancellation state: cancelling any clone cancels all of them.
#[derive(Clone, Debug)]
pub struct Context {
    cancel: Arc<watch::Sender<bool>>,
    if_match: Option<IfMatch>,
    if_none_match: Option<IfNoneMatch>,
    tx_info: Option<TxInfoHandle>,
}

impl Context {
    /// A fresh, uncancelled context with no preconditions.
    pub fn background() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            cancel: Arc::new(cancel),
            if_match: None,
            if_none_match: None,
            tx_info: None,
        }
    }

    pub fn with_if_match(mut self, if_match: IfMatch) -> Self {
        self.if_match = Some(if_match);
        self
    }

    pub fn with_if_none_match(mut self, if_none_match: IfNoneMatch) -> Self {
        self.if_none_match = Some(if_none_match);
        self
    }

    pub fn with_tx_info(mut self, tx_info: TxInfoHandle) -> Self {
        self.tx_info = Some(tx_info);
        self
    }

    pub fn if_match(&self) -> Option<&IfMatch> {
        self.if_match.as_ref()
    }

    pub fn if_none_match(&self) -> Option<&IfNoneMatch> {
        self.if_none_match.as_ref()
    }

    pub fn tx_info(&self) -> Option<&TxInfoHandle> {
        self.tx_info.as_ref()
    }

    /// The preconditions carried by this context.
    pub fn etag_condition(&self) -> ETagCondition {
        ETagCondition {
            if_match: self.if_match.clone(),
            if_none_match: self.if_none_match.clone(),
        }
    }

    /// Append a write outcome if a [`TxInfoHandle`] is attached.
    pub fn record_tx(&self, record: TxRecordInfo) {
        if let Some(handle) = &self.tx_info {
            handle.record(record);
        }
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// `Err(StoreError::Cancelled)` if the context has been cancelled.
    pub fn check_cancelled(&self) -> StoreResult<()> {
        if self.is_cancelled() {
            Err(StoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
