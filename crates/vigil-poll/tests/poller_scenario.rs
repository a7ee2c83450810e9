use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use vigil_poll::{ChangeKind, MemoryTable, PollError, Poller, PollerConfig, Row};
use vigil_store::Context;

#[derive(Clone, Debug, PartialEq)]
struct Silence {
    check: String,
    reason: String,
}

fn silence(reason: &str) -> Silence {
    Silence {
        check: "disk".into(),
        reason: reason.into(),
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn setup() -> (Arc<MemoryTable<Silence>>, Poller<Arc<MemoryTable<Silence>>>) {
    let table = Arc::new(MemoryTable::new(t0()));
    let config = PollerConfig::new(Duration::from_secs(1), Duration::from_secs(5));
    let poller = Poller::new(table.clone(), &config).unwrap();
    (table, poller)
}

#[tokio::test(start_paused = true)]
async fn create_is_reported_once() {
    let (table, mut poller) = setup();
    let ctx = Context::background();
    poller.initialize(&ctx).await.unwrap();
    assert_eq!(poller.watermark(), Some(t0()));

    // Poll 1: nothing written yet.
    assert!(poller.next(&ctx).await.unwrap().is_empty());

    // Poll 2: r1 created at t1.
    table.set_now(t0() + chrono::Duration::seconds(1));
    table.insert("r1", silence("maintenance"));
    let changes = poller.next(&ctx).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change, ChangeKind::Create);
    assert_eq!(changes[0].resource, silence("maintenance"));

    // Poll 3: same row still inside the window, already reported.
    assert!(poller.next(&ctx).await.unwrap().is_empty());
    assert_eq!(table.query_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn late_visible_row_inside_window_is_caught() {
    let (table, mut poller) = setup();
    let ctx = Context::background();
    poller.initialize(&ctx).await.unwrap();

    table.set_now(t0() + chrono::Duration::seconds(10));
    table.insert("r2", silence("deploy"));
    assert_eq!(poller.next(&ctx).await.unwrap().len(), 1);
    assert_eq!(poller.watermark(), Some(t0() + chrono::Duration::seconds(5)));

    // A row stamped before r2 but only now visible, still after the watermark.
    let stamped = t0() + chrono::Duration::seconds(7);
    table.upsert(Row {
        id: "r1".into(),
        created_at: stamped,
        updated_at: stamped,
        deleted_at: None,
        resource: silence("late"),
    });
    let changes = poller.next(&ctx).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].resource, silence("late"));
}

#[tokio::test(start_paused = true)]
async fn update_then_delete() {
    let (table, mut poller) = setup();
    let ctx = Context::background();
    poller.initialize(&ctx).await.unwrap();

    table.set_now(t0() + chrono::Duration::seconds(1));
    table.insert("r1", silence("a"));
    poller.next(&ctx).await.unwrap();

    table.advance(chrono::Duration::seconds(1));
    table.update("r1", silence("b"));
    let changes = poller.next(&ctx).await.unwrap();
    assert_eq!(changes[0].change, ChangeKind::Update);

    table.advance(chrono::Duration::seconds(1));
    table.soft_delete("r1");
    let changes = poller.next(&ctx).await.unwrap();
    assert_eq!(changes[0].change, ChangeKind::Delete);
    assert_eq!(changes[0].resource, silence("b"));
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_fire() {
    let (table, mut poller) = setup();
    let ctx = Context::background();
    poller.initialize(&ctx).await.unwrap();
    table.insert("r1", silence("a"));

    ctx.cancel();
    assert!(matches!(poller.next(&ctx).await, Err(PollError::Cancelled)));
    assert_eq!(table.query_count(), 0);
    assert_eq!(poller.cached_rows(), 0);
}
