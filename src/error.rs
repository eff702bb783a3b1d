use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for remote interactions.
///
/// Staleness detection and reload-loop detection are *conditions* handled
/// internally (auto-corrected or degraded-mode), not errors, so they do not
/// appear here.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote store could not be read or written.
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// The chain RPC fallback failed; balance stays at its last-known value.
    #[error("chain RPC unavailable: {0}")]
    ChainUnavailable(String),

    /// A remote call exceeded the configured bound.
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    /// The withdrawal timestamp could not be persisted. Local interest state
    /// has still been corrected; only durability is lost.
    #[error("failed to record withdrawal: {0}")]
    WithdrawalRecordingFailed(String),
}
