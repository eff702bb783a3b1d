//! Balance push fan-out.
//!
//! One broadcast channel per wallet address, process-wide. Subscribing is
//! idempotent: a second subscriber for the same address fans out from the
//! existing channel instead of opening a duplicate, so a notification is
//! delivered exactly once per receiver. Receivers are simply dropped on
//! unmount; the underlying channels close only on [`BalanceEvents::shutdown`].

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

const BALANCE_EVENT_CHANNEL_SIZE: usize = 64;

/// A balance change pushed from the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct BalancePush {
    pub balance: f64,
    pub updated_at: DateTime<Utc>,
}

pub type BalancePushReceiver = broadcast::Receiver<BalancePush>;

/// Process-wide registry of per-address push channels. Constructed once and
/// injected into each facade instance; tests build isolated registries.
#[derive(Debug, Default)]
pub struct BalanceEvents {
    channels: Mutex<HashMap<String, broadcast::Sender<BalancePush>>>,
}

impl BalanceEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver for `address`, reusing the existing channel when
    /// one is already open.
    pub fn subscribe(&self, address: &str) -> BalancePushReceiver {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(address.to_string())
            .or_insert_with(|| {
                log::debug!("[OBSERVER] opening push channel for {address}");
                broadcast::channel(BALANCE_EVENT_CHANNEL_SIZE).0
            })
            .subscribe()
    }

    /// Delivers a push to every subscriber of `address`. A push for an
    /// address nobody watches is dropped silently.
    pub fn publish(&self, address: &str, push: BalancePush) {
        let channels = self.channels.lock().unwrap();
        if let Some(sender) = channels.get(address) {
            if let Err(err) = sender.send(push) {
                log::trace!("[OBSERVER] push for {address} had no receivers: {err}");
            }
        }
    }

    /// Active subscriber count for an address (diagnostics / tests).
    pub fn receiver_count(&self, address: &str) -> usize {
        self.channels
            .lock()
            .unwrap()
            .get(address)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    /// Closes every channel. Only called at full process teardown or an
    /// explicit global reset.
    pub fn shutdown(&self) {
        self.channels.lock().unwrap().clear();
    }
}
