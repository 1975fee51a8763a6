//! Bounded worker pool for batches of claims.
//!
//! Claims run concurrently up to the policy's `worker_concurrency`; each
//! claim's own provider chain stays sequential. Results come back in input
//! order.

use std::sync::Arc;

use claimtrust_core::{ClaimRequest, ClaimTrustRecord};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::orchestrator::{ChainOrchestrator, RuntimeError};
use crate::resilience::{CancellationToken, UsageLedger, UsageSummary};

enum Slot {
    Spawned(JoinHandle<Result<ClaimTrustRecord, RuntimeError>>),
    Rejected { index: usize, max: u32 },
}

/// Processes claim batches on a shared [`ChainOrchestrator`].
#[derive(Debug, Clone)]
pub struct ClaimWorkerPool {
    orchestrator: Arc<ChainOrchestrator>,
}

impl ClaimWorkerPool {
    pub fn new(orchestrator: Arc<ChainOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        self.orchestrator.ledger()
    }

    pub fn usage(&self) -> UsageSummary {
        self.ledger().summary()
    }

    /// Evaluate a batch. Claims past `max_claims_per_job` are rejected, the
    /// rest queue for one of `worker_concurrency` slots.
    pub async fn run(
        &self,
        claims: Vec<ClaimRequest>,
        cancel: &CancellationToken,
    ) -> Vec<Result<ClaimTrustRecord, RuntimeError>> {
        let policy = self.orchestrator.policy();
        let max_claims = policy.max_claims_per_job;
        let permits = Arc::new(Semaphore::new(policy.worker_concurrency as usize));

        if claims.len() > max_claims as usize {
            tracing::warn!(
                submitted = claims.len(),
                max_claims,
                "Batch exceeds claim limit, rejecting the excess"
            );
        }

        let slots: Vec<Slot> = claims
            .into_iter()
            .enumerate()
            .map(|(index, claim)| {
                if index >= max_claims as usize {
                    return Slot::Rejected {
                        index,
                        max: max_claims,
                    };
                }

                let orchestrator = Arc::clone(&self.orchestrator);
                let permits = Arc::clone(&permits);
                let cancel = cancel.clone();
                Slot::Spawned(tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| RuntimeError::Worker(e.to_string()))?;
                    orchestrator.evaluate(&claim, &cancel).await
                }))
            })
            .collect();

        let ledger = Arc::clone(self.ledger());
        futures::future::join_all(slots.into_iter().map(|slot| {
            let ledger = Arc::clone(&ledger);
            async move {
                let result = match slot {
                    Slot::Spawned(handle) => handle
                        .await
                        .unwrap_or_else(|e| Err(RuntimeError::Worker(e.to_string()))),
                    Slot::Rejected { index, max } => {
                        Err(RuntimeError::ClaimLimitExceeded { index, max })
                    }
                };
                if let Err(error) = &result {
                    tracing::warn!(error = %error, "Claim produced no record");
                    ledger.record_rejected();
                }
                result
            }
        }))
        .await
    }
}
