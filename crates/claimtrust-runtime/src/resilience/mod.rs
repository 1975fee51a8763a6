//! Resilience patterns for claimtrust-runtime.
//!
//! - Per-claim token budget and the batch usage ledger
//! - Linear retry backoff
//! - Cooperative cancellation

mod budget;
mod cancel;
mod retry;

pub use budget::{ChainBudget, UsageLedger, UsageSummary};
pub use cancel::CancellationToken;
pub use retry::{LinearBackoff, LinearBackoffBuilder};
