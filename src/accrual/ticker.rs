//! The local accrual loop: a repeating tokio task that adds the calculator
//! output to the shared accumulator and publishes the rounded value.
//!
//! The ticker is an explicit state object rather than a chain of closures:
//! `status`, `handle`, `principal` and the accumulator are all inspectable,
//! and cancellation is synchronous (`abort` on the task handle).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::accrual::calculator::{per_tick_increment, round8, sanitize};
use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerStatus {
    Stopped,
    Running,
}

#[derive(Debug, Default)]
struct Shared {
    accumulator: f64,
    published: f64,
}

/// Read-only handle onto the published interest value. Cheap to clone;
/// lets the facade expose `interest` without locking the whole ticker.
#[derive(Debug, Clone)]
pub struct InterestReader {
    shared: Arc<Mutex<Shared>>,
}

impl InterestReader {
    pub fn get(&self) -> f64 {
        self.shared.lock().unwrap().published
    }
}

#[derive(Debug)]
pub struct AccrualTicker {
    status: TickerStatus,
    handle: Option<JoinHandle<()>>,
    principal: f64,
    shared: Arc<Mutex<Shared>>,
    annual_rate: f64,
    tick_interval: Duration,
    ticks_per_year: f64,
}

impl AccrualTicker {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            status: TickerStatus::Stopped,
            handle: None,
            principal: 0.0,
            shared: Arc::new(Mutex::new(Shared::default())),
            annual_rate: config.annual_rate,
            tick_interval: config.tick_interval,
            ticks_per_year: config.ticks_per_year(),
        }
    }

    /// Begins ticking against `principal`. No-op when already running.
    ///
    /// The principal is frozen here: the increment is not recomputed from
    /// the live balance on each tick. A balance change therefore requires a
    /// `restart` to refresh the rate basis. Known deviation from
    /// interest-on-current-balance, kept on purpose.
    pub fn start(&mut self, principal: f64) {
        if self.status == TickerStatus::Running {
            log::debug!("[TICKER] start ignored, already running");
            return;
        }

        self.principal = sanitize(principal);
        let increment =
            per_tick_increment(self.principal, self.annual_rate, self.ticks_per_year);
        log::debug!(
            "[TICKER] starting: principal={} increment={}",
            self.principal,
            increment
        );

        let shared = self.shared.clone();
        let tick_interval = self.tick_interval;
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first interval tick completes immediately; skip it so one
            // full interval elapses before any interest is added.
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut s = shared.lock().unwrap();
                s.accumulator += increment;
                s.published = round8(s.accumulator);
            }
        }));
        self.status = TickerStatus::Running;
    }

    /// Cancels the tick task immediately. The accumulator is left as-is and
    /// survives a later `start`.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        if self.status == TickerStatus::Running {
            log::debug!("[TICKER] stopped at interest={}", self.interest());
        }
        self.status = TickerStatus::Stopped;
    }

    /// Stop-then-start with a new principal, refreshing the rate basis
    /// without touching the accumulator.
    pub fn restart(&mut self, principal: f64) {
        self.stop();
        self.start(principal);
    }

    /// Overwrites the accumulator (reconciliation seed / reset to zero).
    pub fn seed(&self, value: f64) {
        let value = sanitize(value);
        let mut s = self.shared.lock().unwrap();
        s.accumulator = value;
        s.published = round8(value);
    }

    pub fn reset(&self) {
        self.seed(0.0);
    }

    /// The current published (rounded) interest.
    pub fn interest(&self) -> f64 {
        self.shared.lock().unwrap().published
    }

    pub fn reader(&self) -> InterestReader {
        InterestReader {
            shared: self.shared.clone(),
        }
    }

    pub fn status(&self) -> TickerStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == TickerStatus::Running
    }

    pub fn principal(&self) -> f64 {
        self.principal
    }
}

impl Drop for AccrualTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
