//! Call dispatch: eligibility checks, rate limiting, placement, bookkeeping.
//!
//! There is exactly one placement code path; the synchronous entrance and the
//! queued job both land on [`Dispatcher::dispatch`]. Preconditions make the
//! job safe to re-run: a redelivered job for a claim that already has a call
//! in flight comes back [`DispatchOutcome::AlreadyInProgress`].

use std::sync::Arc;

use payerline_core::{Call, CallStatus, ClaimStatus};
use payerline_store::{Store, StoreError};
use payerline_voice::{CallMetadata, CallPlacer, VoiceError, build_call_context};
use thiserror::Error;
use tracing::info;

use crate::rate_limit::RateLimiter;

/// Result of a dispatch attempt that did not error.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Call placed; claim marked in progress, call row created.
    Placed { call_id: i64, external_id: String },
    /// Claim already has a call in flight; nothing placed.
    AlreadyInProgress,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Not retryable.
    #[error("claim {0} not found")]
    ClaimNotFound(i64),

    /// Payer missing or without a phone number; not retryable.
    #[error("payer for claim {0} has no phone number")]
    PayerUnreachable(i64),

    /// Backpressure; retry after the cooldown, not the normal retry delay.
    #[error("payer {0} is rate limited")]
    RateLimited(i64),

    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// Whether the job runner may retry with the standard delay.
    /// [`DispatchError::RateLimited`] is handled separately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ClaimNotFound(_) | Self::PayerUnreachable(_) | Self::RateLimited(_) => false,
            Self::Voice(err) => err.is_retryable(),
            Self::Store(_) => true,
        }
    }
}

/// Turns a claim id into a placed call, subject to eligibility and rate checks.
pub struct Dispatcher {
    store: Arc<dyn Store>,
    placer: Arc<dyn CallPlacer>,
    limiter: RateLimiter,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, placer: Arc<dyn CallPlacer>, limiter: RateLimiter) -> Self {
        Self {
            store,
            placer,
            limiter,
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Place an outbound call for a claim.
    ///
    /// Checks run in order: claim exists, claim not already in progress,
    /// payer reachable, payer under the rate ceiling. On success the call
    /// row and the claim's `in_progress` flip commit as one unit, then the
    /// rate counter records the placement.
    pub async fn dispatch(&self, claim_id: i64) -> Result<DispatchOutcome, DispatchError> {
        let claim = self
            .store
            .claim(claim_id)
            .await?
            .ok_or(DispatchError::ClaimNotFound(claim_id))?;
        if claim.status == ClaimStatus::InProgress {
            return Ok(DispatchOutcome::AlreadyInProgress);
        }

        let payer = self
            .store
            .payer(claim.payer_id)
            .await?
            .filter(|p| !p.phone.trim().is_empty())
            .ok_or(DispatchError::PayerUnreachable(claim_id))?;

        if !self.limiter.allow(payer.id).await {
            return Err(DispatchError::RateLimited(payer.id));
        }

        let context = build_call_context(&claim, &payer);
        let metadata = CallMetadata {
            claim_id: claim.id.to_string(),
            claim_number: claim.claim_number.clone(),
            practice_id: claim.practice_id.to_string(),
        };
        let external_id = self.placer.place(&payer.phone, &context, &metadata).await?;

        let call = self
            .store
            .commit_placement(
                claim_id,
                Call {
                    id: 0,
                    claim_id,
                    status: CallStatus::Initiated,
                    outcome: None,
                    duration_seconds: None,
                    transcript: None,
                    external_id: external_id.clone(),
                    extracted_data: None,
                },
            )
            .await?;
        self.limiter.record(payer.id).await;

        info!(
            claim_id,
            call_id = call.id,
            external_id = %external_id,
            payer_id = payer.id,
            "call dispatched"
        );
        Ok(DispatchOutcome::Placed {
            call_id: call.id,
            external_id,
        })
    }
}
