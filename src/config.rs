use std::time::Duration;

const SECS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// All engine tunables in one place.
///
/// Defaults mirror the production constants. The two sync throttle windows
/// are deliberately kept separate: background flushes are throttled at
/// 15 minutes, explicitly requested syncs at 10 seconds.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Annual interest rate applied to the principal (0.10 = 10%/year).
    pub annual_rate: f64,

    /// Wall-clock interval between accrual ticks.
    pub tick_interval: Duration,

    /// Minimum spacing between background (best-effort) interest flushes.
    pub background_sync_interval: Duration,

    /// Minimum spacing between explicitly requested interest flushes.
    pub manual_sync_interval: Duration,

    /// Remote interest below this is treated as zero.
    pub interest_epsilon: f64,

    /// Local/remote interest gap above this is logged before a flush.
    pub discrepancy_threshold: f64,

    /// A balance drop greater than this fraction of the previous balance...
    pub withdrawal_relative_drop: f64,

    /// ...AND greater than this absolute amount is treated as a withdrawal.
    pub withdrawal_absolute_drop: f64,

    /// Window over which repeated initializations are counted.
    pub guard_window: Duration,

    /// Init count above this logs a warning; above double it, the guard
    /// short-circuits the mount entirely.
    pub guard_warn_threshold: u32,

    /// Upper bound on every remote store / chain call.
    pub remote_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            annual_rate: 0.10,
            tick_interval: Duration::from_millis(500),
            background_sync_interval: Duration::from_secs(15 * 60),
            manual_sync_interval: Duration::from_secs(10),
            interest_epsilon: 1e-6,
            discrepancy_threshold: 0.01,
            withdrawal_relative_drop: 0.01,
            withdrawal_absolute_drop: 0.1,
            guard_window: Duration::from_secs(10),
            guard_warn_threshold: 5,
            remote_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    /// Number of accrual ticks in a year, derived from the tick interval.
    /// With the default 0.5s tick this is 2 * 60 * 60 * 24 * 365.
    pub fn ticks_per_year(&self) -> f64 {
        SECS_PER_YEAR / self.tick_interval.as_secs_f64()
    }
}
