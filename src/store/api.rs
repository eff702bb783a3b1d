use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::store::types::{BalanceRow, WithdrawalRow};

/// Row-level access to the remote store for one wallet's balance, interest
/// and withdrawal records. Every write is an idempotent upsert.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// The authoritative balance row, or `None` when the wallet has never
    /// been mirrored into the store.
    async fn fetch_balance(&self, address: &str) -> Result<Option<BalanceRow>>;

    /// Just the persisted interest value (the pre-flush discrepancy check).
    async fn fetch_interest(&self, address: &str) -> Result<Option<f64>>;

    /// Upserts `(address, interest, at)`.
    async fn upsert_interest(&self, address: &str, interest: f64, at: DateTime<Utc>)
        -> Result<()>;

    /// The wallet's last-withdrawal record, if any was ever written.
    async fn fetch_withdrawal(&self, address: &str) -> Result<Option<WithdrawalRow>>;

    /// Upserts the wallet's last-withdrawal timestamp.
    async fn upsert_withdrawal(&self, address: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Read-only balance query against the token contract, used when the store
/// has no row or cannot be reached.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Raw on-chain balance in base units, scaled by [`Self::decimals`].
    async fn balance_of(&self, address: &str) -> Result<u128>;

    /// Token decimals (USDC: 6).
    fn decimals(&self) -> u32;
}

/// Bounds a remote call, mapping elapsed deadlines onto [`Error::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(limit)),
    }
}
