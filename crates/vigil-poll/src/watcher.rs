//! Background task that drives a [`Poller`] and streams [`WatchEvent`]s.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vigil_store::Context;

use crate::config::WatcherConfig;
use crate::error::PollError;
use crate::poller::Poller;
use crate::table::{ChangeKind, RowChange, Table};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WatchAction {
    Create,
    Update,
    Delete,
    /// Polling failed. The event carries the error text and no resource.
    Error,
}

impl From<ChangeKind> for WatchAction {
    fn from(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Create => Self::Create,
            ChangeKind::Update => Self::Update,
            ChangeKind::Delete => Self::Delete,
        }
    }
}

/// One entry of the change stream consumed by watch fan-out layers.
#[derive(Clone, Debug, PartialEq)]
pub struct WatchEvent<P> {
    pub action: WatchAction,
    pub resource: Option<P>,
    pub error: Option<String>,
}

impl<P> WatchEvent<P> {
    pub fn error(err: &PollError) -> Self {
        Self {
            action: WatchAction::Error,
            resource: None,
            error: Some(err.to_string()),
        }
    }
}

impl<P> From<RowChange<P>> for WatchEvent<P> {
    fn from(change: RowChange<P>) -> Self {
        Self {
            action: change.change.into(),
            resource: Some(change.resource),
            error: None,
        }
    }
}

/// Spawns the polling loop for one poller.
pub struct Watcher;

impl Watcher {
    /// Initialize `poller` and poll it until `ctx` is cancelled or the
    /// receiver is dropped.
    ///
    /// Poll errors are sent as [`WatchAction::Error`] events and polling
    /// continues. A failed initialization is reported the same way and ends
    /// the task.
    pub fn spawn<T>(
        mut poller: Poller<T>,
        ctx: Context,
        config: &WatcherConfig,
    ) -> (mpsc::Receiver<WatchEvent<T::Payload>>, JoinHandle<()>)
    where
        T: Table + 'static,
    {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));

        let handle = tokio::spawn(async move {
            if let Err(err) = poller.initialize(&ctx).await {
                warn!(error = %err, "watcher failed to initialize poller");
                emit(&ctx, &tx, WatchEvent::error(&err)).await;
                return;
            }

            loop {
                match poller.next(&ctx).await {
                    Ok(changes) => {
                        for change in changes {
                            if !emit(&ctx, &tx, change.into()).await {
                                return;
                            }
                        }
                    }
                    Err(PollError::Cancelled) => break,
                    Err(err) => {
                        warn!(error = %err, "poll failed");
                        if !emit(&ctx, &tx, WatchEvent::error(&err)).await {
                            return;
                        }
                    }
                }
                if tx.is_closed() {
                    break;
                }
            }
            debug!("watcher stopped");
        });

        (rx, handle)
    }
}

/// Send one event. Returns `false` once the stream should stop.
async fn emit<P>(ctx: &Context, tx: &mpsc::Sender<WatchEvent<P>>, event: WatchEvent<P>) -> bool {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}
