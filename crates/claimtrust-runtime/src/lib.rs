//! # claimtrust-runtime
//!
//! Async side of ClaimTrust: talks to fact-check providers and walks each
//! claim through the provider chain.
//!
//! `claimtrust-core` decides (gate, consensus, trust, export); this crate
//! does the I/O around those decisions:
//! - provider port, adapter-boundary normalization, mock and HTTP providers
//! - per-claim budget, retry with linear backoff, timeouts, cancellation
//! - the chain orchestrator and a bounded worker pool for batches
//!
//! ## Example
//!
//! ```rust,no_run
//! use claimtrust_core::{ClaimRequest, PolicyConfig};
//! use claimtrust_runtime::{CancellationToken, ChainOrchestrator};
//!
//! # async fn run() -> Result<(), claimtrust_runtime::RuntimeError> {
//! let orchestrator = ChainOrchestrator::builder(PolicyConfig::default()).build()?;
//! let claim = ClaimRequest::new("Laut offizieller Statistik sank die Quote").with_language("de");
//!
//! let record = orchestrator.evaluate(&claim, &CancellationToken::new()).await?;
//! println!("{} ({:.2})", record.consensus.verdict, record.consensus.confidence);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod orchestrator;
pub mod pool;
pub mod providers;
pub mod resilience;

pub use config::{Mode, RuntimeConfig};
pub use orchestrator::{
    ChainOrchestrator, ChainOrchestratorBuilder, ChainRun, ClaimReport, ProviderFailure,
    RuntimeError, StopReason,
};
pub use pool::ClaimWorkerPool;
pub use providers::{
    FactCheckProvider, MockProvider, ProviderChain, ProviderError, ProviderRegistry,
    RawProviderResponse,
};
pub use resilience::{CancellationToken, UsageLedger, UsageSummary};
