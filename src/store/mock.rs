//! Pure in-memory store/chain mocks for tests: call-counting, failure
//! injection, optional artificial latency.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::store::api::{ChainClient, RemoteStore};
use crate::store::types::{BalanceRow, WithdrawalRow};

#[derive(Default)]
struct MockStoreInner {
    balances: HashMap<String, BalanceRow>,
    withdrawals: HashMap<String, WithdrawalRow>,

    balance_fetches: u32,
    interest_fetches: u32,
    interest_writes: Vec<f64>,
    withdrawal_writes: u32,

    fail_reads: bool,
    fail_writes: bool,
    read_delay: Option<Duration>,
}

#[derive(Default)]
pub struct MockStore {
    inner: Mutex<MockStoreInner>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance_row(&self, address: &str, balance: f64, interest: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.balances.insert(
            address.to_string(),
            BalanceRow {
                wallet_address: address.to_string(),
                usdc_balance: balance,
                interest_amount: interest,
                last_updated: Some(Utc::now()),
                created_at: Some(Utc::now()),
            },
        );
    }

    pub fn set_withdrawal(&self, address: &str, at: DateTime<Utc>) {
        self.inner.lock().unwrap().withdrawals.insert(
            address.to_string(),
            WithdrawalRow {
                wallet_address: address.to_string(),
                withdrawal_time: at,
            },
        );
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.lock().unwrap().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_writes = fail;
    }

    /// Every read sleeps this long first; lets tests overlap in-flight calls.
    pub fn set_read_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().read_delay = Some(delay);
    }

    pub fn balance_fetches(&self) -> u32 {
        self.inner.lock().unwrap().balance_fetches
    }

    pub fn interest_fetches(&self) -> u32 {
        self.inner.lock().unwrap().interest_fetches
    }

    /// Every interest value written, in order.
    pub fn interest_writes(&self) -> Vec<f64> {
        self.inner.lock().unwrap().interest_writes.clone()
    }

    pub fn last_interest_write(&self) -> Option<f64> {
        self.inner.lock().unwrap().interest_writes.last().copied()
    }

    pub fn withdrawal_writes(&self) -> u32 {
        self.inner.lock().unwrap().withdrawal_writes
    }

    async fn simulate_latency(&self) {
        let delay = self.inner.lock().unwrap().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RemoteStore for MockStore {
    async fn fetch_balance(&self, address: &str) -> Result<Option<BalanceRow>> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().unwrap();
        inner.balance_fetches += 1;
        if inner.fail_reads {
            return Err(Error::RemoteUnavailable("injected read failure".into()));
        }
        Ok(inner.balances.get(address).cloned())
    }

    async fn fetch_interest(&self, address: &str) -> Result<Option<f64>> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().unwrap();
        inner.interest_fetches += 1;
        if inner.fail_reads {
            return Err(Error::RemoteUnavailable("injected read failure".into()));
        }
        Ok(inner.balances.get(address).map(|row| row.interest_amount))
    }

    async fn upsert_interest(
        &self,
        address: &str,
        interest: f64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_writes {
            return Err(Error::RemoteUnavailable("injected write failure".into()));
        }
        inner.interest_writes.push(interest);
        let row = inner
            .balances
            .entry(address.to_string())
            .or_insert_with(|| BalanceRow {
                wallet_address: address.to_string(),
                usdc_balance: 0.0,
                interest_amount: 0.0,
                last_updated: None,
                created_at: Some(at),
            });
        row.interest_amount = interest;
        row.last_updated = Some(at);
        Ok(())
    }

    async fn fetch_withdrawal(&self, address: &str) -> Result<Option<WithdrawalRow>> {
        self.simulate_latency().await;
        let inner = self.inner.lock().unwrap();
        if inner.fail_reads {
            return Err(Error::RemoteUnavailable("injected read failure".into()));
        }
        Ok(inner.withdrawals.get(address).cloned())
    }

    async fn upsert_withdrawal(&self, address: &str, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_writes {
            return Err(Error::RemoteUnavailable("injected write failure".into()));
        }
        inner.withdrawal_writes += 1;
        inner.withdrawals.insert(
            address.to_string(),
            WithdrawalRow {
                wallet_address: address.to_string(),
                withdrawal_time: at,
            },
        );
        Ok(())
    }
}

pub struct MockChain {
    raw_balance: Mutex<u128>,
    fail: Mutex<bool>,
    calls: Mutex<u32>,
    decimals: u32,
}

impl MockChain {
    /// `raw_balance` is in base units (USDC: 6 decimals, so 1_000_000 = 1.0).
    pub fn new(raw_balance: u128) -> Self {
        Self {
            raw_balance: Mutex::new(raw_balance),
            fail: Mutex::new(false),
            calls: Mutex::new(0),
            decimals: 6,
        }
    }

    pub fn set_raw_balance(&self, raw: u128) {
        *self.raw_balance.lock().unwrap() = raw;
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn balance_of(&self, _address: &str) -> Result<u128> {
        *self.calls.lock().unwrap() += 1;
        if *self.fail.lock().unwrap() {
            return Err(Error::ChainUnavailable("injected RPC failure".into()));
        }
        Ok(*self.raw_balance.lock().unwrap())
    }

    fn decimals(&self) -> u32 {
        self.decimals
    }
}
