use chrono::{DateTime, Utc};

use crate::config::EngineConfig;

#[derive(Debug)]
pub struct EngineState {
    pub config: EngineConfig,

    /// When this app session began; withdrawals after this point always
    /// invalidate remote interest.
    pub session_started_at: DateTime<Utc>,

    /// Last balance this engine saw, for withdrawal detection.
    pub prev_balance: Option<f64>,

    /// Last known withdrawal timestamp (persisted remotely, cached here).
    pub last_withdrawal: Option<DateTime<Utc>>,
}
