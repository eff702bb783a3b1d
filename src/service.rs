//! Public facade and command driver.
//!
//! `YieldService` is the imperative shell around the pure
//! [`ReconcileEngine`](crate::engine::ReconcileEngine): it fetches
//! authoritative state, feeds events into the engine and executes the
//! resulting commands against the store/chain seams. The UI layer reads
//! [`YieldSnapshot`] and calls the four imperative actions.
//!
//! Flush and reconciliation are serialized per wallet behind one async
//! mutex, so a push-driven reconcile can never interleave with a
//! read-then-write flush.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::accrual::{AccrualTicker, InterestReader};
use crate::config::EngineConfig;
use crate::engine::{BalanceUpdate, EngineCommand, EngineEvent, ReconcileEngine};
use crate::error::Result;
use crate::guard::{InitVerdict, SessionGuard};
use crate::observer::{BalanceEvents, BalancePush};
use crate::store::api::{with_timeout, ChainClient, RemoteStore};
use crate::sync::{SyncThrottle, SyncWindow};
use crate::withdrawal::WithdrawalTracker;

/// What the UI renders.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldSnapshot {
    pub balance: f64,
    pub interest: f64,
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct StateCell {
    balance: f64,
    is_loading: bool,
    error: Option<String>,
    last_updated: Option<DateTime<Utc>>,
}

/// Everything that must stay serialized per wallet.
struct Core {
    engine: ReconcileEngine,
    ticker: AccrualTicker,
    throttle: SyncThrottle,
    withdrawals: WithdrawalTracker,
}

pub struct YieldService<S, C> {
    address: String,
    config: EngineConfig,
    store: Arc<S>,
    chain: Arc<C>,
    events: Arc<BalanceEvents>,
    guard: Arc<SessionGuard>,
    core: AsyncMutex<Core>,
    state: StdMutex<StateCell>,
    interest: InterestReader,
    push_task: StdMutex<Option<JoinHandle<()>>>,
    degraded: AtomicBool,
}

impl<S, C> YieldService<S, C>
where
    S: RemoteStore + 'static,
    C: ChainClient + 'static,
{
    pub fn new(
        address: &str,
        config: EngineConfig,
        store: Arc<S>,
        chain: Arc<C>,
        events: Arc<BalanceEvents>,
        guard: Arc<SessionGuard>,
    ) -> Arc<Self> {
        let ticker = AccrualTicker::new(&config);
        let interest = ticker.reader();
        let core = Core {
            engine: ReconcileEngine::new(config.clone(), Utc::now()),
            ticker,
            throttle: SyncThrottle::new(&config),
            withdrawals: WithdrawalTracker::new(address),
        };

        Arc::new(Self {
            address: address.to_string(),
            config,
            store,
            chain,
            events,
            guard,
            core: AsyncMutex::new(core),
            state: StdMutex::new(StateCell::default()),
            interest,
            push_task: StdMutex::new(None),
            degraded: AtomicBool::new(false),
        })
    }

    /// Starts a session: loads the withdrawal bound, fetches the
    /// authoritative triple, reconciles, starts accrual and subscribes to
    /// pushes. A tripped session guard turns the whole call into a no-op.
    pub async fn init(self: &Arc<Self>) -> Result<()> {
        if self.guard.note_init() == InitVerdict::ShortCircuit {
            self.degraded.store(true, Ordering::SeqCst);
            return Ok(());
        }
        self.degraded.store(false, Ordering::SeqCst);

        if !self.begin_loading() {
            log::debug!("[SERVICE] init skipped, fetch already in flight");
            return Ok(());
        }

        {
            let mut core = self.core.lock().await;
            let loaded = core
                .withdrawals
                .load(self.store.as_ref(), self.config.remote_timeout)
                .await;
            core.engine.set_last_withdrawal(loaded);
        }

        let result = self.refresh_inner().await;
        self.finish_loading(&result);

        // Subscribe even if the initial fetch failed; a push can recover us.
        self.spawn_push_listener();
        result
    }

    /// Current UI state. Interest reads straight from the accrual loop's
    /// published value.
    pub fn state(&self) -> YieldSnapshot {
        let state = self.state.lock().unwrap();
        YieldSnapshot {
            balance: state.balance,
            interest: self.interest.get(),
            is_loading: state.is_loading,
            error: state.error.clone(),
            last_updated: state.last_updated,
        }
    }

    /// Re-fetches the authoritative balance and reconciles. A call while a
    /// fetch is already in flight is a no-op.
    pub async fn refresh_balance(&self) -> Result<()> {
        if self.is_degraded() {
            return Ok(());
        }
        if !self.begin_loading() {
            log::debug!("[SERVICE] refresh skipped, fetch already in flight");
            return Ok(());
        }
        let result = self.refresh_inner().await;
        self.finish_loading(&result);
        result
    }

    /// Flushes the accumulated interest through the manual throttle window.
    /// Returns `Ok(false)` when the throttle rejected the flush.
    pub async fn sync_interest(&self, force: bool) -> Result<bool> {
        if self.is_degraded() {
            return Ok(false);
        }
        let mut core = self.core.lock().await;
        self.flush_locked(&mut core, SyncWindow::Manual, force).await
    }

    /// Best-effort periodic flush through the background window. Failures
    /// are logged, never surfaced.
    pub async fn sync_background(&self) -> bool {
        if self.is_degraded() {
            return false;
        }
        let mut core = self.core.lock().await;
        match self
            .flush_locked(&mut core, SyncWindow::Background, false)
            .await
        {
            Ok(written) => written,
            Err(err) => {
                log::warn!("[SYNC] background flush failed: {err}");
                false
            }
        }
    }

    /// Zeroes local interest and writes the zero through to the store.
    /// The local reset applies even when the remote write fails.
    pub async fn reset_interest(&self) -> Result<bool> {
        if self.is_degraded() {
            return Ok(false);
        }
        let mut core = self.core.lock().await;
        core.ticker.reset();
        with_timeout(
            self.config.remote_timeout,
            self.store.upsert_interest(&self.address, 0.0, Utc::now()),
        )
        .await?;
        core.throttle.mark(SyncWindow::Background);
        Ok(true)
    }

    /// Records a withdrawal: persists the timestamp, zeroes interest, stops
    /// the (now stale-principal) accrual loop and refreshes to restart it
    /// against the post-withdrawal balance.
    ///
    /// On a store failure the local reset still applies and the error is
    /// surfaced so the caller can retry or alert.
    pub async fn register_withdrawal(&self) -> Result<bool> {
        if self.is_degraded() {
            return Ok(false);
        }

        let outcome = {
            let mut core = self.core.lock().await;
            let outcome = core
                .withdrawals
                .register(self.store.as_ref(), self.config.remote_timeout)
                .await;
            let at = core.withdrawals.last().unwrap_or_else(Utc::now);
            let cmds = core
                .engine
                .handle_event(EngineEvent::WithdrawalRegistered { at }, Utc::now());
            self.apply_commands(&mut core, cmds).await;
            outcome
        };

        if let Err(err) = self.refresh_balance().await {
            log::warn!("[SERVICE] post-withdrawal refresh failed: {err}");
        }

        outcome.map(|_| true)
    }

    /// Ends the session: stops the push listener and the accrual loop, then
    /// makes one forced best-effort flush of the accumulator.
    pub async fn shutdown(&self) {
        if let Some(task) = self.push_task.lock().unwrap().take() {
            task.abort();
        }
        let mut core = self.core.lock().await;
        core.ticker.stop();
        if let Err(err) = self
            .flush_locked(&mut core, SyncWindow::Background, true)
            .await
        {
            log::warn!("[SYNC] shutdown flush failed: {err}");
        }
    }

    /// Whether the session guard put this instance into no-op mode.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    // ---------------------------------------------------------------------
    // internals
    // ---------------------------------------------------------------------

    async fn refresh_inner(&self) -> Result<()> {
        let update = self.fetch_authoritative().await?;
        self.reconcile(EngineEvent::Snapshot(update)).await;
        Ok(())
    }

    /// Store first; chain read (with interest 0) when the store has no row
    /// or cannot be reached. Interest has no on-chain source of truth.
    async fn fetch_authoritative(&self) -> Result<BalanceUpdate> {
        match with_timeout(
            self.config.remote_timeout,
            self.store.fetch_balance(&self.address),
        )
        .await
        {
            Ok(Some(row)) => Ok(BalanceUpdate {
                balance: row.usdc_balance,
                remote_interest: row.interest_amount,
                last_updated: row.last_updated,
            }),
            Ok(None) => {
                log::info!("[SERVICE] no store row for {}, reading chain", self.address);
                self.chain_fallback().await
            }
            Err(err) => {
                log::warn!("[SERVICE] store fetch failed ({err}), reading chain");
                self.chain_fallback().await
            }
        }
    }

    async fn chain_fallback(&self) -> Result<BalanceUpdate> {
        let raw = with_timeout(
            self.config.remote_timeout,
            self.chain.balance_of(&self.address),
        )
        .await?;
        let scale = 10u128.pow(self.chain.decimals()) as f64;
        Ok(BalanceUpdate {
            balance: raw as f64 / scale,
            remote_interest: 0.0,
            last_updated: None,
        })
    }

    async fn reconcile(&self, event: EngineEvent) {
        let mut core = self.core.lock().await;
        let cmds = core.engine.handle_event(event, Utc::now());
        self.apply_commands(&mut core, cmds).await;
    }

    async fn apply_commands(&self, core: &mut Core, cmds: Vec<EngineCommand>) {
        for cmd in cmds {
            log::trace!("[SERVICE] cmd: {cmd:?}");
            match cmd {
                EngineCommand::PublishBalance {
                    balance,
                    updated_at,
                } => {
                    let mut state = self.state.lock().unwrap();
                    state.balance = balance;
                    state.last_updated = updated_at;
                }
                EngineCommand::SeedAccrual { interest } => core.ticker.seed(interest),
                EngineCommand::StartAccrual { principal } => {
                    // An already-running loop on the same basis is left alone.
                    let same_basis =
                        core.ticker.is_running() && core.ticker.principal() == principal;
                    if !same_basis {
                        core.ticker.restart(principal);
                    }
                }
                EngineCommand::StopAccrual => core.ticker.stop(),
                EngineCommand::ResetRemoteInterest => {
                    let write = with_timeout(
                        self.config.remote_timeout,
                        self.store.upsert_interest(&self.address, 0.0, Utc::now()),
                    )
                    .await;
                    if let Err(err) = write {
                        log::warn!("[SERVICE] remote interest reset failed: {err}");
                    }
                }
                EngineCommand::RecordWithdrawal => {
                    match core
                        .withdrawals
                        .register(self.store.as_ref(), self.config.remote_timeout)
                        .await
                    {
                        Ok(at) => core.engine.set_last_withdrawal(Some(at)),
                        Err(err) => {
                            // Durability lost; the session-local bound from
                            // the tracker cache still applies.
                            log::warn!("[SERVICE] withdrawal recording failed: {err}");
                            core.engine.set_last_withdrawal(core.withdrawals.last());
                        }
                    }
                }
            }
        }
    }

    async fn flush_locked(
        &self,
        core: &mut Core,
        window: SyncWindow,
        force: bool,
    ) -> Result<bool> {
        if !core.throttle.check(window, force) {
            log::debug!("[SYNC] flush throttled ({window:?})");
            return Ok(false);
        }
        let local = core.ticker.interest();

        // One re-read before writing: a large gap means another writer got
        // there since we last reconciled, worth a warning before overwrite.
        match with_timeout(
            self.config.remote_timeout,
            self.store.fetch_interest(&self.address),
        )
        .await
        {
            Ok(Some(remote)) if (remote - local).abs() > self.config.discrepancy_threshold => {
                log::warn!("[SYNC] local/remote interest gap: local={local} remote={remote}");
            }
            Ok(_) => {}
            Err(err) => log::warn!("[SYNC] pre-flush read failed: {err}"),
        }

        with_timeout(
            self.config.remote_timeout,
            self.store.upsert_interest(&self.address, local, Utc::now()),
        )
        .await?;
        core.throttle.mark(window);
        log::debug!("[SYNC] flushed interest={local}");
        Ok(true)
    }

    async fn on_push(&self, push: BalancePush) {
        // Re-read remote interest to complete the authoritative triple; a
        // zero balance needs no read, it resets unconditionally.
        let remote_interest = if push.balance <= 0.0 {
            0.0
        } else {
            match with_timeout(
                self.config.remote_timeout,
                self.store.fetch_interest(&self.address),
            )
            .await
            {
                Ok(Some(value)) => value,
                Ok(None) => 0.0,
                Err(err) => {
                    log::warn!(
                        "[SERVICE] interest read on push failed ({err}), keeping local value"
                    );
                    self.interest.get()
                }
            }
        };

        let update = BalanceUpdate {
            balance: push.balance,
            remote_interest,
            last_updated: Some(push.updated_at),
        };
        self.reconcile(EngineEvent::Snapshot(update)).await;
    }

    fn spawn_push_listener(self: &Arc<Self>) {
        let mut slot = self.push_task.lock().unwrap();
        if slot.is_some() {
            return;
        }
        let mut rx = self.events.subscribe(&self.address);
        let weak = Arc::downgrade(self);
        *slot = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(push) => {
                        let Some(service) = weak.upgrade() else { break };
                        log::debug!("[SERVICE] push: balance={}", push.balance);
                        service.on_push(push).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("[SERVICE] push listener lagged, skipped {skipped}");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Marks the loading flag; `false` means a fetch is already in flight.
    fn begin_loading(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.is_loading {
            return false;
        }
        state.is_loading = true;
        state.error = None;
        true
    }

    fn finish_loading(&self, result: &Result<()>) {
        let mut state = self.state.lock().unwrap();
        state.is_loading = false;
        state.error = result.as_ref().err().map(|e| e.to_string());
    }
}

impl<S, C> Drop for YieldService<S, C> {
    fn drop(&mut self) {
        if let Some(task) = self.push_task.lock().unwrap().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests;
