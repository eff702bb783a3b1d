//! Last-withdrawal tracking: a remotely persisted timestamp with a local
//! cache, consumed by the plausibility check in the reconciliation engine.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::store::api::{with_timeout, RemoteStore};

#[derive(Debug)]
pub struct WithdrawalTracker {
    address: String,
    cached: Option<DateTime<Utc>>,
}

impl WithdrawalTracker {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            cached: None,
        }
    }

    /// Loads the last-withdrawal timestamp from the store. A read failure
    /// falls back to whatever was cached this session; reconciliation then
    /// simply runs without a fresher bound.
    pub async fn load<S: RemoteStore>(
        &mut self,
        store: &S,
        timeout: Duration,
    ) -> Option<DateTime<Utc>> {
        match with_timeout(timeout, store.fetch_withdrawal(&self.address)).await {
            Ok(row) => {
                self.cached = row.map(|r| r.withdrawal_time).or(self.cached);
                self.cached
            }
            Err(err) => {
                log::warn!("[WITHDRAW] load failed, using cached value: {err}");
                self.cached
            }
        }
    }

    /// Persists `now` as the wallet's last withdrawal.
    ///
    /// On a write failure the timestamp is still cached locally so the
    /// session stays consistent, and the failure is surfaced for the caller
    /// to retry or alert on.
    pub async fn register<S: RemoteStore>(
        &mut self,
        store: &S,
        timeout: Duration,
    ) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.cached = Some(now);
        match with_timeout(timeout, store.upsert_withdrawal(&self.address, now)).await {
            Ok(()) => {
                log::info!("[WITHDRAW] recorded withdrawal at {now}");
                Ok(now)
            }
            Err(err) => Err(Error::WithdrawalRecordingFailed(err.to_string())),
        }
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.cached
    }
}
