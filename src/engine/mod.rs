//! Reconciliation decision engine.
//!
//! This module is the **Functional Core** of the balance/interest logic.
//! It acts as a pure state machine:
//! - **Input**: `EngineEvent` (authoritative snapshots, withdrawals).
//! - **Output**: `Vec<EngineCommand>` (side effects for the driver).
//!
//! # Architecture guarantees
//! * **No Network**: this module never touches the store or the chain.
//! * **No Async**: all functions are synchronous and fast.
//! * **Deterministic**: the same state, event and clock always produce the
//!   same commands.

pub mod state;
mod logic;
pub mod types;


pub use crate::engine::types::{BalanceUpdate, EngineCommand, EngineEvent};

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use state::EngineState;

/// Decides, for each authoritative observation, whether to keep, reset or
/// adopt the remote interest value, and whether the accrual loop runs.
#[derive(Debug)]
pub struct ReconcileEngine {
    state: EngineState,
}

impl ReconcileEngine {
    pub fn new(config: EngineConfig, session_started_at: DateTime<Utc>) -> Self {
        Self {
            state: EngineState {
                config,
                session_started_at,
                prev_balance: None,
                last_withdrawal: None,
            },
        }
    }

    /// The main entry point. Consumes an event and returns the commands the
    /// driver must execute. `now` is threaded in for determinism.
    pub fn handle_event(&mut self, event: EngineEvent, now: DateTime<Utc>) -> Vec<EngineCommand> {
        match event {
            EngineEvent::Snapshot(update) => logic::on_snapshot(&mut self.state, update, now),
            EngineEvent::WithdrawalRegistered { at } => {
                logic::on_withdrawal_registered(&mut self.state, at)
            }
        }
    }

    /// Installs the last-withdrawal timestamp loaded from the store at
    /// session start, before the first snapshot is reconciled.
    pub fn set_last_withdrawal(&mut self, at: Option<DateTime<Utc>>) {
        self.state.last_withdrawal = at;
    }

    pub fn last_withdrawal(&self) -> Option<DateTime<Utc>> {
        self.state.last_withdrawal
    }
}
