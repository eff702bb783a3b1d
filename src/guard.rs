//! Reload-loop detection. A UI remount storm re-initializes the facade many
//! times in quick succession; past a threshold the guard short-circuits the
//! mount so no fetch/subscribe work piles up.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitVerdict {
    /// Normal startup.
    Proceed,
    /// Suspiciously many inits; proceed, but it has been logged.
    Warned,
    /// Reload loop confirmed: skip all fetch/subscribe work for this mount.
    ShortCircuit,
}

#[derive(Debug)]
struct GuardInner {
    init_count: u32,
    window_start: Instant,
}

/// Process-wide mount counter. Shared (via `Arc`) across every facade
/// instance so a remount storm is visible no matter which instance mounts.
#[derive(Debug)]
pub struct SessionGuard {
    window: Duration,
    warn_threshold: u32,
    inner: Mutex<GuardInner>,
}

impl SessionGuard {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window: config.guard_window,
            warn_threshold: config.guard_warn_threshold,
            inner: Mutex::new(GuardInner {
                init_count: 0,
                window_start: Instant::now(),
            }),
        }
    }

    pub fn note_init(&self) -> InitVerdict {
        let mut inner = self.inner.lock().unwrap();

        if inner.window_start.elapsed() > self.window {
            inner.init_count = 0;
            inner.window_start = Instant::now();
        }
        inner.init_count += 1;

        if inner.init_count > self.warn_threshold * 2 {
            log::warn!(
                "[GUARD] {} inits within {:?}: reload loop, short-circuiting",
                inner.init_count,
                self.window
            );
            InitVerdict::ShortCircuit
        } else if inner.init_count > self.warn_threshold {
            log::warn!(
                "[GUARD] {} inits within {:?}: possible reload loop",
                inner.init_count,
                self.window
            );
            InitVerdict::Warned
        } else {
            InitVerdict::Proceed
        }
    }
}
