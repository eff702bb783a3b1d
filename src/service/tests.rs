use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::EngineConfig;
use crate::error::Error;
use crate::guard::SessionGuard;
use crate::observer::{BalanceEvents, BalancePush};
use crate::service::YieldService;
use crate::store::mock::{MockChain, MockStore};

const ADDR: &str = "0xwallet";

struct Harness {
    service: Arc<YieldService<MockStore, MockChain>>,
    store: Arc<MockStore>,
    chain: Arc<MockChain>,
    events: Arc<BalanceEvents>,
}

fn harness_with(config: EngineConfig) -> Harness {
    let store = Arc::new(MockStore::new());
    let chain = Arc::new(MockChain::new(0));
    let events = Arc::new(BalanceEvents::new());
    let guard = Arc::new(SessionGuard::new(&config));
    let service = YieldService::new(
        ADDR,
        config,
        store.clone(),
        chain.clone(),
        events.clone(),
        guard,
    );
    Harness {
        service,
        store,
        chain,
        events,
    }
}

fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

/// Lets spawned tasks (push listener, ticker) run under the paused clock.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn init_publishes_balance_and_accrues() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.5);

    h.service.init().await.unwrap();
    let snap = h.service.state();
    assert_eq!(snap.balance, 1000.0);
    assert_eq!(snap.interest, 0.5);
    assert!(!snap.is_loading);
    assert!(snap.error.is_none());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(h.service.state().interest > 0.5, "interest is not accruing");
}

#[tokio::test(start_paused = true)]
async fn missing_store_row_falls_back_to_chain() {
    let h = harness();
    h.chain.set_raw_balance(250_000_000); // 250.0 at 6 decimals

    h.service.init().await.unwrap();
    let snap = h.service.state();
    assert_eq!(snap.balance, 250.0);
    assert_eq!(snap.interest, 0.0);
    assert_eq!(h.chain.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn store_failure_falls_back_to_chain() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.5);
    h.store.fail_reads(true);
    h.chain.set_raw_balance(900_000_000);

    h.service.init().await.unwrap();
    assert_eq!(h.service.state().balance, 900.0);
    // Interest has no on-chain source of truth.
    assert_eq!(h.service.state().interest, 0.0);
}

#[tokio::test(start_paused = true)]
async fn chain_failure_surfaces_error() {
    let h = harness();
    h.store.fail_reads(true);
    h.chain.fail(true);

    let err = h.service.init().await.unwrap_err();
    assert!(matches!(err, Error::ChainUnavailable(_)));
    let snap = h.service.state();
    assert!(snap.error.is_some());
    assert!(!snap.is_loading);
}

#[tokio::test(start_paused = true)]
async fn refresh_while_loading_is_a_noop() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.0);
    h.service.init().await.unwrap();

    h.store.set_read_delay(Duration::from_millis(100));
    let before = h.store.balance_fetches();

    let (a, b) = tokio::join!(h.service.refresh_balance(), h.service.refresh_balance());
    a.unwrap();
    b.unwrap();

    assert_eq!(
        h.store.balance_fetches(),
        before + 1,
        "overlapping refresh must not fetch twice"
    );
}

#[tokio::test(start_paused = true)]
async fn overlapping_init_fetches_once() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.0);
    h.store.set_read_delay(Duration::from_millis(100));

    let (a, b) = tokio::join!(h.service.init(), h.service.init());
    a.unwrap();
    b.unwrap();

    assert_eq!(
        h.store.balance_fetches(),
        1,
        "overlapping init must not fetch twice"
    );
}

#[tokio::test(start_paused = true)]
async fn zero_balance_push_resets_interest_and_stops_accrual() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 12.3);
    h.service.init().await.unwrap();
    assert_eq!(h.service.state().interest, 12.3);

    h.events.publish(
        ADDR,
        BalancePush {
            balance: 0.0,
            updated_at: Utc::now(),
        },
    );
    settle().await;

    let snap = h.service.state();
    assert_eq!(snap.balance, 0.0);
    assert_eq!(snap.interest, 0.0);
    assert_eq!(h.store.last_interest_write(), Some(0.0));

    // Loop must stay down: no accrual after several tick intervals.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.service.state().interest, 0.0);
}

#[tokio::test(start_paused = true)]
async fn push_update_reconciles_new_balance() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.002);
    h.service.init().await.unwrap();

    // Deposit: balance grows, stored interest is still plausible.
    h.store.set_balance_row(ADDR, 1500.0, 0.002);
    h.events.publish(
        ADDR,
        BalancePush {
            balance: 1500.0,
            updated_at: Utc::now(),
        },
    );
    settle().await;

    let snap = h.service.state();
    assert_eq!(snap.balance, 1500.0);
    assert!(snap.interest >= 0.002);
}

#[tokio::test(start_paused = true)]
async fn sync_throttle_allows_exactly_one_write() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.2);
    h.service.init().await.unwrap();
    let before = h.store.interest_writes().len();

    assert!(h.service.sync_interest(false).await.unwrap());
    assert!(!h.service.sync_interest(false).await.unwrap());
    assert_eq!(h.store.interest_writes().len(), before + 1);

    // A forced sync bypasses the window.
    assert!(h.service.sync_interest(true).await.unwrap());
    assert_eq!(h.store.interest_writes().len(), before + 2);
}

#[tokio::test(start_paused = true)]
async fn background_and_manual_windows_are_independent() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.2);
    h.service.init().await.unwrap();
    let before = h.store.interest_writes().len();

    assert!(h.service.sync_interest(false).await.unwrap());
    // The manual flush did not consume the background window.
    assert!(h.service.sync_background().await);
    assert!(!h.service.sync_background().await);
    assert_eq!(h.store.interest_writes().len(), before + 2);
}

#[tokio::test(start_paused = true)]
async fn background_flush_swallows_write_failures() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.2);
    h.service.init().await.unwrap();

    h.store.fail_writes(true);
    assert!(!h.service.sync_background().await);

    // The failed flush must not consume the window.
    h.store.fail_writes(false);
    assert!(h.service.sync_background().await);
}

#[tokio::test(start_paused = true)]
async fn flush_rereads_remote_before_writing() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.2);
    h.service.init().await.unwrap();

    // Another writer moved the remote value since we last reconciled.
    h.store.set_balance_row(ADDR, 1000.0, 5.0);
    let reads = h.store.interest_fetches();

    assert!(h.service.sync_interest(true).await.unwrap());
    assert_eq!(
        h.store.interest_fetches(),
        reads + 1,
        "flush must re-read remote interest before writing"
    );
    // The local value still wins the overwrite despite the gap.
    let written = h.store.last_interest_write().unwrap();
    assert!(written < 1.0, "remote value clobbered the local flush");
}

#[tokio::test(start_paused = true)]
async fn throttled_flush_performs_no_remote_reads() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.2);
    h.service.init().await.unwrap();

    assert!(h.service.sync_interest(false).await.unwrap());
    let reads = h.store.interest_fetches();
    let writes = h.store.interest_writes().len();

    assert!(!h.service.sync_interest(false).await.unwrap());
    assert_eq!(h.store.interest_fetches(), reads);
    assert_eq!(h.store.interest_writes().len(), writes);
}

#[tokio::test(start_paused = true)]
async fn forced_sync_writes_the_accumulated_interest() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.0);
    h.service.init().await.unwrap();

    tokio::time::sleep(Duration::from_millis(2200)).await;
    let local = h.service.state().interest;
    assert!(local > 0.0);

    assert!(h.service.sync_interest(true).await.unwrap());
    assert_eq!(h.store.last_interest_write(), Some(local));
}

#[tokio::test(start_paused = true)]
async fn reset_interest_zeroes_local_and_remote() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 3.5);
    h.service.init().await.unwrap();
    assert_eq!(h.service.state().interest, 3.5);

    assert!(h.service.reset_interest().await.unwrap());
    assert_eq!(h.service.state().interest, 0.0);
    assert_eq!(h.store.last_interest_write(), Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn register_withdrawal_resets_and_restarts() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 5.0);
    h.service.init().await.unwrap();
    assert_eq!(h.service.state().interest, 5.0);

    assert!(h.service.register_withdrawal().await.unwrap());
    assert_eq!(h.store.withdrawal_writes(), 1);
    assert_eq!(h.service.state().interest, 0.0);

    // Accrual restarted against the refreshed balance.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.service.state().interest > 0.0);
}

#[tokio::test(start_paused = true)]
async fn withdrawal_write_failure_still_resets_locally() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 5.0);
    h.service.init().await.unwrap();

    h.store.fail_writes(true);
    let err = h.service.register_withdrawal().await.unwrap_err();
    assert!(matches!(err, Error::WithdrawalRecordingFailed(_)));
    assert_eq!(h.store.withdrawal_writes(), 0);
    // UI stays consistent even though durability was lost.
    assert_eq!(h.service.state().interest, 0.0);
}

#[tokio::test(start_paused = true)]
async fn reload_loop_short_circuits_init() {
    let config = EngineConfig {
        guard_warn_threshold: 2,
        ..EngineConfig::default()
    };
    let h = harness_with(config);
    h.store.set_balance_row(ADDR, 1000.0, 0.0);

    // Short-circuit trips on the init after double the threshold.
    for _ in 0..4 {
        h.service.init().await.unwrap();
    }
    let fetches = h.store.balance_fetches();

    h.service.init().await.unwrap();
    assert!(h.service.is_degraded());
    assert_eq!(h.store.balance_fetches(), fetches, "degraded init still fetched");

    // Degraded mode turns the actions into no-ops.
    h.service.refresh_balance().await.unwrap();
    assert!(!h.service.sync_interest(true).await.unwrap());
    assert_eq!(h.store.balance_fetches(), fetches);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_accrual_and_flushes() {
    let h = harness();
    h.store.set_balance_row(ADDR, 1000.0, 0.0);
    h.service.init().await.unwrap();

    tokio::time::sleep(Duration::from_millis(2200)).await;
    let accrued = h.service.state().interest;
    assert!(accrued > 0.0);

    h.service.shutdown().await;
    assert_eq!(h.store.last_interest_write(), Some(accrued));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.service.state().interest, accrued, "ticked after shutdown");
}
