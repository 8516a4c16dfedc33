//! In-process dispatch queue.
//!
//! Not a general task framework: a fixed pool of worker tasks pulls claim
//! ids off a channel and runs [`Dispatcher::dispatch`] with the retry
//! policy. Delivery is at-least-once in spirit — job bodies are safe to
//! re-run because dispatch re-checks its preconditions every attempt.

use std::sync::Arc;

use payerline_core::ClaimStatus;
use payerline_core::config::DispatchConfig;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::dispatch::{DispatchError, DispatchOutcome, Dispatcher};

/// Upper bound on rate-limit cooldown waits per job. Cooldowns do not consume
/// the retry budget, so a payer capped indefinitely needs its own bound.
const MAX_COOLDOWN_WAITS: u32 = 10;

/// Handle for enqueueing dispatch jobs. Cheap to clone.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<i64>,
    dispatcher: Arc<Dispatcher>,
}

impl DispatchQueue {
    /// Spawn the worker pool and return the queue handle plus worker tasks.
    ///
    /// Workers exit once every queue handle is dropped and the channel
    /// drains.
    pub fn start(
        dispatcher: Arc<Dispatcher>,
        config: DispatchConfig,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::unbounded_channel::<i64>();
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..config.workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let dispatcher = Arc::clone(&dispatcher);
                let config = config.clone();
                tokio::spawn(async move {
                    loop {
                        let claim_id = { rx.lock().await.recv().await };
                        let Some(claim_id) = claim_id else { break };
                        run_job(&dispatcher, &config, claim_id).await;
                    }
                    info!(worker, "dispatch worker stopped");
                })
            })
            .collect();
        (Self { tx, dispatcher }, workers)
    }

    /// Queue one claim for dispatch. Returns false if the workers are gone.
    pub fn enqueue(&self, claim_id: i64) -> bool {
        self.tx.send(claim_id).is_ok()
    }

    /// Queue many claims, skipping ones already in progress (or missing) at
    /// enqueue time. Returns how many were queued.
    pub async fn enqueue_bulk(&self, claim_ids: &[i64]) -> usize {
        let mut queued = 0;
        for &claim_id in claim_ids {
            match self.dispatcher.store().claim(claim_id).await {
                Ok(Some(claim)) if claim.status != ClaimStatus::InProgress => {
                    if self.enqueue(claim_id) {
                        queued += 1;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(claim_id, error = %err, "bulk enqueue skipped claim");
                }
            }
        }
        queued
    }
}

/// One dispatch job: retry transient failures up to the attempt budget, wait
/// out rate limits on the longer cooldown, stop on terminal errors.
async fn run_job(dispatcher: &Dispatcher, config: &DispatchConfig, claim_id: i64) {
    let mut attempts = 0u32;
    let mut cooldowns = 0u32;
    loop {
        match dispatcher.dispatch(claim_id).await {
            Ok(DispatchOutcome::Placed { call_id, .. }) => {
                info!(claim_id, call_id, "dispatch job complete");
                return;
            }
            Ok(DispatchOutcome::AlreadyInProgress) => {
                info!(claim_id, "dispatch job skipped, claim already in progress");
                return;
            }
            Err(DispatchError::RateLimited(payer_id)) => {
                cooldowns += 1;
                if cooldowns > MAX_COOLDOWN_WAITS {
                    error!(claim_id, payer_id, "dispatch gave up waiting out rate limit");
                    return;
                }
                warn!(claim_id, payer_id, cooldowns, "payer rate limited, cooling down");
                tokio::time::sleep(config.cooldown()).await;
            }
            Err(err) if err.is_retryable() => {
                attempts += 1;
                if attempts >= config.max_attempts {
                    error!(claim_id, attempts, error = %err, "dispatch failed terminally");
                    return;
                }
                warn!(claim_id, attempts, error = %err, "dispatch attempt failed, retrying");
                tokio::time::sleep(config.retry_delay()).await;
            }
            Err(err) => {
                warn!(claim_id, error = %err, "dispatch failed, not retryable");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimiter;
    use crate::testutil::{FakePlacer, sample_claim, seed};
    use payerline_core::config::RateLimitConfig;
    use payerline_store::{MemCounters, MemStore, Store};

    fn fast_config() -> DispatchConfig {
        DispatchConfig {
            max_attempts: 3,
            retry_delay_secs: 0,
            cooldown_secs: 0,
            workers: 2,
        }
    }

    fn dispatcher(store: Arc<MemStore>, placer: Arc<FakePlacer>) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            store,
            placer,
            RateLimiter::new(Arc::new(MemCounters::new()), RateLimitConfig::default()),
        ))
    }

    async fn drain(queue: DispatchQueue, workers: Vec<JoinHandle<()>>) {
        drop(queue);
        for worker in workers {
            worker.await.unwrap();
        }
    }

    #[tokio::test]
    async fn transient_failures_retry_to_success() {
        let store = Arc::new(MemStore::new());
        let placer = Arc::new(FakePlacer::failing_first(2));
        let (_, _, claim) = seed(&store).await;
        let (queue, workers) = DispatchQueue::start(dispatcher(store.clone(), placer), fast_config());

        assert!(queue.enqueue(claim.id));
        drain(queue, workers).await;

        let claim = store.claim(claim.id).await.unwrap().unwrap();
        assert_eq!(claim.status, ClaimStatus::InProgress);
        assert_eq!(store.calls_for_claim(claim.id).await.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_leave_claim_untouched() {
        let store = Arc::new(MemStore::new());
        let placer = Arc::new(FakePlacer::always_failing());
        let (_, _, claim) = seed(&store).await;
        let (queue, workers) = DispatchQueue::start(dispatcher(store.clone(), placer), fast_config());

        queue.enqueue(claim.id);
        drain(queue, workers).await;

        // Terminal failure: no silent claim mutation, no call row.
        let claim = store.claim(claim.id).await.unwrap().unwrap();
        assert_eq!(claim.status, ClaimStatus::Pending);
        assert!(store.calls_for_claim(claim.id).await.is_empty());
    }

    #[tokio::test]
    async fn bulk_enqueue_skips_in_progress_claims() {
        let store = Arc::new(MemStore::new());
        let placer = Arc::new(FakePlacer::new());
        let (practice, payer, busy) = seed(&store).await;
        let mut busy_claim = store.claim(busy.id).await.unwrap().unwrap();
        busy_claim.status = ClaimStatus::InProgress;
        store.update_claim(&busy_claim).await.unwrap();
        let pending = store.insert_claim(sample_claim(practice.id, payer.id)).await;
        let (queue, workers) = DispatchQueue::start(dispatcher(store.clone(), placer), fast_config());

        let queued = queue.enqueue_bulk(&[busy.id, pending.id, 9999]).await;
        assert_eq!(queued, 1);
        drain(queue, workers).await;

        assert!(store.calls_for_claim(busy.id).await.is_empty());
        assert_eq!(store.calls_for_claim(pending.id).await.len(), 1);
    }
}
