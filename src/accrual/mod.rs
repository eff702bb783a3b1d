//! Interest accrual: pure per-tick math plus the repeating timer that
//! applies it to the in-memory accumulator.

pub mod calculator;
pub mod ticker;

pub use ticker::{AccrualTicker, InterestReader, TickerStatus};
