use chrono::{DateTime, Utc};

/// An authoritative `(balance, remote interest, last updated)` triple, as
/// observed from the remote store (or the chain fallback with interest 0).
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceUpdate {
    pub balance: f64,
    pub remote_interest: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A fresh authoritative triple arrived: initial load, manual refresh,
    /// or a push update (the driver re-reads remote interest for pushes).
    Snapshot(BalanceUpdate),

    /// A withdrawal was explicitly registered by the caller.
    WithdrawalRegistered { at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Publish the authoritative balance to facade state.
    PublishBalance {
        balance: f64,
        updated_at: Option<DateTime<Utc>>,
    },

    /// Overwrite the local accumulator with this seed.
    SeedAccrual { interest: f64 },

    /// (Re)start the accrual loop against this principal.
    StartAccrual { principal: f64 },

    /// Cancel the accrual loop without restarting it.
    StopAccrual,

    /// Write a zero interest row to the remote store (best-effort).
    ResetRemoteInterest,

    /// Persist `now` as the wallet's last-withdrawal timestamp.
    RecordWithdrawal,
}
