//! Client-side balance/interest reconciliation engine.
//!
//! Keeps a locally simulated, continuously accruing interest value consistent
//! with an authoritative balance held in a remote store (with a blockchain
//! read as fallback), across push updates, manual refreshes, withdrawals and
//! app foreground/background transitions.
//!
//! The crate is split into a **functional core** and an **imperative shell**:
//! - [`engine`] is a pure state machine: `EngineEvent` in, `Vec<EngineCommand>`
//!   out. No network, no async, deterministic.
//! - [`service`] drives the engine: it executes commands against the
//!   [`store`] trait seams, owns the accrual ticker and the sync throttle,
//!   and exposes the read/refresh/sync/withdraw surface consumed by the UI.
//!
//! Remote collaborators (the data store, the chain RPC, the push channel)
//! are traits; in-memory mocks live in [`store::mock`].

pub mod accrual;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod observer;
pub mod service;
pub mod store;
pub mod sync;
pub mod withdrawal;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use observer::{BalanceEvents, BalancePush};
pub use service::{YieldService, YieldSnapshot};
