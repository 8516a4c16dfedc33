//! Follow-up scheduling: operator-created scheduled calls and the periodic
//! poller that feeds due rows back into the dispatch queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use payerline_core::ScheduledCall;
use payerline_core::config::SchedulerConfig;
use payerline_store::{Store, StoreError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::queue::DispatchQueue;

/// Scheduled-call reasons are stored truncated to this many characters.
pub const REASON_MAX_CHARS: usize = 255;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("claim {0} not found")]
    ClaimNotFound(i64),

    #[error("call_after must be in the future")]
    NotFuture,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Create a scheduled follow-up call for a claim.
///
/// `call_after` must be strictly in the future; the reason is truncated to
/// [`REASON_MAX_CHARS`].
pub async fn schedule_call(
    store: &dyn Store,
    claim_id: i64,
    call_after: DateTime<Utc>,
    reason: Option<String>,
) -> Result<ScheduledCall, ScheduleError> {
    if store.claim(claim_id).await?.is_none() {
        return Err(ScheduleError::ClaimNotFound(claim_id));
    }
    if call_after <= Utc::now() {
        return Err(ScheduleError::NotFuture);
    }
    let reason = reason
        .map(|r| r.chars().take(REASON_MAX_CHARS).collect::<String>())
        .filter(|r| !r.trim().is_empty());
    let scheduled = store
        .create_scheduled_call(ScheduledCall {
            id: 0,
            claim_id,
            call_after,
            reason,
        })
        .await?;
    info!(
        claim_id,
        scheduled_id = scheduled.id,
        call_after = %call_after,
        "follow-up call scheduled"
    );
    Ok(scheduled)
}

/// Take every due scheduled call, hand its claim to the dispatch queue, and
/// report how many were processed.
///
/// Selection and deletion happen as one store operation, so a second tick
/// cannot re-process the same row. The dispatcher's in-progress guard is the
/// backstop against any double dispatch that slips past that.
pub async fn process_scheduled_calls(
    store: &dyn Store,
    queue: &DispatchQueue,
) -> Result<usize, StoreError> {
    let due = store.take_due_scheduled_calls(Utc::now()).await?;
    for row in &due {
        info!(
            claim_id = row.claim_id,
            scheduled_id = row.id,
            "due scheduled call queued for dispatch"
        );
        queue.enqueue(row.claim_id);
    }
    Ok(due.len())
}

/// Periodic poller wrapping [`process_scheduled_calls`].
pub struct ScheduledCallPoller {
    store: Arc<dyn Store>,
    queue: DispatchQueue,
    config: SchedulerConfig,
}

impl ScheduledCallPoller {
    pub fn new(store: Arc<dyn Store>, queue: DispatchQueue, config: SchedulerConfig) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    /// Spawn the poll loop. A failed tick is logged and superseded by the
    /// next one; the task runs until aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.poll_interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match process_scheduled_calls(self.store.as_ref(), &self.queue).await {
                    Ok(0) => {}
                    Ok(processed) => info!(processed, "scheduled-call poll tick"),
                    Err(err) => warn!(error = %err, "scheduled-call poll tick failed"),
                }
            }
        })
    }
}
