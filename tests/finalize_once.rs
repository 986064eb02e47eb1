//! The once-per-cycle settlement guarantee, exercised end to end against
//! the in-memory store.

mod common;

use chrono::Utc;
use common::{CountingPublisher, MemoryStore};
use glidepath::config::{PoolConfig, SharedPools};
use glidepath::domain::CycleWindow;
use glidepath::engine::{CycleFinalizer, YieldDistributor};
use glidepath::persistence::Store;
use glidepath::services::Metrics;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

fn pools() -> SharedPools {
    let mut map = HashMap::new();
    map.insert(
        "Basic".to_string(),
        PoolConfig {
            yield_min: 2.0,
            yield_max: 2.0,
            coefficient: Decimal::ONE,
        },
    );
    SharedPools::new(map)
}

fn finalizer(
    store: Arc<MemoryStore>,
    publisher: Arc<CountingPublisher>,
) -> CycleFinalizer {
    let distributor = YieldDistributor::new(store.clone() as Arc<dyn Store>, pools());
    CycleFinalizer::new(
        store as Arc<dyn Store>,
        distributor,
        publisher,
        Arc::new(Metrics::new()),
        common::engine_config(),
    )
}

#[tokio::test]
async fn repeated_ticks_settle_one_cycle_once() {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(CountingPublisher::new());
    let finalizer = finalizer(store.clone(), publisher.clone());

    let now = Utc::now();
    assert!(finalizer.tick(now).await.unwrap());
    assert!(!finalizer.tick(now).await.unwrap());
    assert!(!finalizer.tick(now).await.unwrap());

    assert_eq!(store.settlement_count(), 1);
    assert_eq!(publisher.settlement_count(), 1);
}

#[tokio::test]
async fn concurrent_finalizers_produce_one_winner() {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(CountingPublisher::new());
    let finalizer = Arc::new(finalizer(store.clone(), publisher.clone()));

    let now = Utc::now();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let finalizer = Arc::clone(&finalizer);
        handles.push(tokio::spawn(async move { finalizer.tick(now).await }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(store.settlement_count(), 1);
    assert_eq!(publisher.settlement_count(), 1);
}

#[tokio::test]
async fn aggregate_covers_exactly_the_closed_window() {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(CountingPublisher::new());
    let finalizer = finalizer(store.clone(), publisher.clone());

    let now = Utc::now();
    let window = CycleWindow::last_closed(now, 15);

    store.insert_trade_at(1.25, window.start + chrono::Duration::hours(1));
    store.insert_trade_at(-0.40, window.start + chrono::Duration::hours(5));
    store.insert_trade_at(2.00, window.start + chrono::Duration::hours(20));
    // Belongs to the open cycle, must not be counted
    store.insert_trade_at(9.99, window.end + chrono::Duration::hours(1));

    assert!(finalizer.tick(now).await.unwrap());

    let settlement = store.get_settlement(window.date).await.unwrap().unwrap();
    assert!((settlement.aggregate_pct - 2.85).abs() < 1e-9);
    assert_eq!(settlement.events_count, 3);
}

#[tokio::test]
async fn open_cycle_cannot_be_finalized_by_date() {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(CountingPublisher::new());
    let finalizer = finalizer(store.clone(), publisher.clone());

    let open_date = CycleWindow::containing(Utc::now(), 15).date;
    assert!(finalizer.finalize_date(open_date).await.is_err());
    assert_eq!(store.settlement_count(), 0);
}

#[tokio::test]
async fn distribution_happens_only_on_the_winning_tick() {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(CountingPublisher::new());
    store.add_position(common::position(1, 100, "Basic", dec!(1000), false));
    store.add_position(common::position(2, 200, "Basic", dec!(500), true));
    let finalizer = finalizer(store.clone(), publisher.clone());

    let now = Utc::now();
    assert!(finalizer.tick(now).await.unwrap());
    assert!(!finalizer.tick(now).await.unwrap());

    assert_eq!(store.income_entries().len(), 2);
}

#[tokio::test]
async fn forced_rerun_pays_only_unsettled_positions() {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(CountingPublisher::new());
    store.add_position(common::position(1, 100, "Basic", dec!(1000), false));
    let finalizer = finalizer(store.clone(), publisher.clone());

    let now = Utc::now();
    let window = CycleWindow::last_closed(now, 15);
    assert!(finalizer.tick(now).await.unwrap());
    assert_eq!(store.income_entries().len(), 1);

    // A position that missed the first run, e.g. restored from a backup
    store.add_position(common::position(2, 200, "Basic", dec!(500), false));
    assert!(!finalizer.finalize_date(window.date).await.unwrap());

    let entries = store.income_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries.iter().filter(|e| e.position_id == 1).count(),
        1,
        "already settled position must not be paid twice"
    );
    // The forced re-run does not publish again
    assert_eq!(publisher.settlement_count(), 1);
}
