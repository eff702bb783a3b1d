use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the `wallet_balances` table. Interest is persisted alongside
/// the balance so a single read yields the full authoritative triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub wallet_address: String,
    pub usdc_balance: f64,
    #[serde(default)]
    pub interest_amount: f64,
    pub last_updated: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One row of the `wallet_withdrawals` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRow {
    pub wallet_address: String,
    pub withdrawal_time: DateTime<Utc>,
}
