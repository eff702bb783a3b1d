//! Sync throttling. Two independent windows gate interest flushes: the long
//! one for periodic/background flushes, the short one for explicitly
//! requested syncs. A forced flush always passes.
//!
//! The throttle only *admits* a flush; the caller stamps the window with
//! [`SyncThrottle::mark`] after the write actually succeeds, so a failed
//! flush does not consume the window.

use std::time::Instant;

use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncWindow {
    /// Periodic / background flushes (15 min default).
    Background,
    /// Explicitly requested syncs (10 s default).
    Manual,
}

#[derive(Debug)]
pub struct SyncThrottle {
    background_interval: std::time::Duration,
    manual_interval: std::time::Duration,
    last_background: Option<Instant>,
    last_manual: Option<Instant>,
}

impl SyncThrottle {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            background_interval: config.background_sync_interval,
            manual_interval: config.manual_sync_interval,
            last_background: None,
            last_manual: None,
        }
    }

    /// Whether a flush through `window` may proceed now.
    pub fn check(&self, window: SyncWindow, force: bool) -> bool {
        if force {
            return true;
        }
        let (last, interval) = match window {
            SyncWindow::Background => (self.last_background, self.background_interval),
            SyncWindow::Manual => (self.last_manual, self.manual_interval),
        };
        match last {
            Some(at) => at.elapsed() >= interval,
            None => true,
        }
    }

    /// Records a successful flush through `window`.
    pub fn mark(&mut self, window: SyncWindow) {
        let now = Instant::now();
        match window {
            SyncWindow::Background => self.last_background = Some(now),
            SyncWindow::Manual => self.last_manual = Some(now),
        }
    }
}
