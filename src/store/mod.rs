//! External collaborator seams: the remote data store and the chain RPC.
//!
//! Production backends live outside this crate; tests (and embedders that
//! want one) use the in-memory mocks.

pub mod api;
pub mod mock;
pub mod types;

pub use api::{with_timeout, ChainClient, RemoteStore};
pub use types::{BalanceRow, WithdrawalRow};
