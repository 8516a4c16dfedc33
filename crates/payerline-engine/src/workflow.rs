//! Post-call pipeline: extract → apply → notify → decide follow-up → schedule.
//!
//! A fixed five-step sequence over one explicit [`PostCallState`], with a
//! single conditional edge before the schedule step. Each step merges its
//! output into the state before the next runs; no step failure stops the
//! pipeline — extraction and notification degrade, they never propagate.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use payerline_core::config::NotifyConfig;
use payerline_core::outcome::fallback_claim_status;
use payerline_core::{Call, CallOutcome, ExtractedOutcome, ScheduledCall};
use payerline_store::Store;

use crate::extract::{ExtractionHints, OutcomeExtractor, bounded_transcript};
use crate::notify::{Notifier, compose_notification, resolve_recipients};
use crate::scheduling::REASON_MAX_CHARS;

/// Default follow-up distance when the text asks for one without a day count.
const DEFAULT_FOLLOW_UP_DAYS: i64 = 5;

/// Phrases that suggest the payer expects another call.
static FOLLOW_UP_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)call\s*back|callback|follow\s*up|followup|call\s*again|in\s+\d+\s+days?|next\s+week|recheck|call\s+in",
    )
    .expect("invalid follow-up keyword regex")
});

static IN_DAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)in\s+(\d+)\s+days?").expect("invalid day-count regex"));

/// Shared state threaded through the pipeline steps.
#[derive(Debug, Clone)]
pub struct PostCallState {
    pub claim_id: i64,
    pub call_id: i64,
    pub transcript: String,
    /// Coarse outcome derived from the provider's ended reason.
    pub call_outcome: CallOutcome,
    pub denial_code: Option<String>,
    pub payer_name: Option<String>,
    pub extracted: Option<ExtractedOutcome>,
    pub claim_updated: bool,
    pub claimer_notified: bool,
    pub schedule_after: Option<DateTime<Utc>>,
    pub schedule_reason: Option<String>,
}

/// Runs the five-step pipeline once per ended call.
pub struct PostCallWorkflow {
    store: Arc<dyn Store>,
    extractor: Arc<dyn OutcomeExtractor>,
    notifier: Arc<dyn Notifier>,
    notify_config: NotifyConfig,
}

impl PostCallWorkflow {
    pub fn new(
        store: Arc<dyn Store>,
        extractor: Arc<dyn OutcomeExtractor>,
        notifier: Arc<dyn Notifier>,
        notify_config: NotifyConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            notifier,
            notify_config,
        }
    }

    /// Run the pipeline for an ended call and return the final state.
    pub async fn run(&self, call: &Call) -> PostCallState {
        let mut state = self.seed_state(call).await;
        self.extract_step(&mut state).await;
        self.apply_step(call, &mut state).await;
        self.notify_step(call, &mut state).await;
        if let Some((after, reason)) = decide_follow_up(state.extracted.as_ref(), Utc::now()) {
            state.schedule_after = Some(after);
            state.schedule_reason = Some(reason);
        }
        self.schedule_step(&mut state).await;
        info!(
            claim_id = state.claim_id,
            call_id = state.call_id,
            extracted = state.extracted.is_some(),
            claim_updated = state.claim_updated,
            claimer_notified = state.claimer_notified,
            follow_up = state.schedule_after.is_some(),
            "post-call workflow complete"
        );
        state
    }

    async fn seed_state(&self, call: &Call) -> PostCallState {
        let (denial_code, payer_name) = match self.store.claim(call.claim_id).await {
            Ok(Some(claim)) => {
                let payer_name = match self.store.payer(claim.payer_id).await {
                    Ok(Some(payer)) => Some(payer.name),
                    _ => None,
                };
                (claim.denial_code, payer_name)
            }
            _ => (None, None),
        };
        PostCallState {
            claim_id: call.claim_id,
            call_id: call.id,
            transcript: call.transcript.clone().unwrap_or_default(),
            call_outcome: call.outcome.unwrap_or(CallOutcome::Resolved),
            denial_code,
            payer_name,
            extracted: None,
            claim_updated: false,
            claimer_notified: false,
            schedule_after: None,
            schedule_reason: None,
        }
    }

    /// Step 1: structured extraction, skipped for empty transcripts.
    async fn extract_step(&self, state: &mut PostCallState) {
        let transcript = state.transcript.trim();
        if transcript.is_empty() {
            debug!(call_id = state.call_id, "empty transcript, extraction skipped");
            return;
        }
        let hints = ExtractionHints {
            denial_code: state.denial_code.clone(),
            payer_name: state.payer_name.clone(),
        };
        state.extracted = self
            .extractor
            .extract(bounded_transcript(transcript), &hints)
            .await;
    }

    /// Step 2: apply the outcome to the claim, or the coarse ended-reason
    /// fallback when nothing was extracted.
    async fn apply_step(&self, call: &Call, state: &mut PostCallState) {
        let mut claim = match self.store.claim(state.claim_id).await {
            Ok(Some(claim)) => claim,
            _ => {
                warn!(claim_id = state.claim_id, "claim vanished before apply step");
                return;
            }
        };

        if let Some(extracted) = &state.extracted {
            // Keep the raw payload on the call row for later review.
            if let Ok(payload) = serde_json::to_value(extracted) {
                let mut call = call.clone();
                call.extracted_data = Some(payload);
                if let Err(err) = self.store.update_call(&call).await {
                    warn!(call_id = call.id, error = %err, "failed to store extracted payload");
                }
            }

            claim.status = extracted.claim_status_update();
            // Only overwrite denial fields with non-empty values, never blank them.
            if let Some(reason) = extracted.denial_reason.as_deref().filter(|r| !r.trim().is_empty()) {
                claim.denial_reason = Some(reason.to_string());
            }
            if let Some(code) = extracted.denial_code.as_deref().filter(|c| !c.trim().is_empty()) {
                claim.denial_code = Some(code.to_string());
            }

            let mut notes_parts = Vec::new();
            if !extracted.summary.trim().is_empty() {
                notes_parts.push(extracted.summary.trim().to_string());
            }
            if let Some(next_steps) = extracted.next_steps.as_deref().filter(|n| !n.trim().is_empty()) {
                notes_parts.push(next_steps.trim().to_string());
            }
            if !notes_parts.is_empty() {
                let appended = notes_parts.join("\n");
                claim.notes = Some(match claim.notes.as_deref().map(str::trim) {
                    Some(existing) if !existing.is_empty() => format!("{existing}\n{appended}"),
                    _ => appended,
                });
            }

            match self.store.update_claim(&claim).await {
                Ok(()) => state.claim_updated = true,
                Err(err) => warn!(claim_id = claim.id, error = %err, "failed to apply outcome"),
            }
        } else if let Some(status) = fallback_claim_status(state.call_outcome) {
            claim.status = status;
            match self.store.update_claim(&claim).await {
                Ok(()) => state.claim_updated = true,
                Err(err) => warn!(claim_id = claim.id, error = %err, "failed to apply fallback"),
            }
        }
    }

    /// Step 3: notify the practice. Never blocks or fails the pipeline.
    async fn notify_step(&self, call: &Call, state: &mut PostCallState) {
        let claim = match self.store.claim(state.claim_id).await {
            Ok(Some(claim)) => claim,
            _ => return,
        };
        let recipients = resolve_recipients(self.store.as_ref(), claim.practice_id).await;
        if recipients.is_empty() {
            debug!(claim_id = claim.id, "no notification recipients");
            return;
        }
        let (subject, body) = compose_notification(
            &self.notify_config.app_name,
            &claim,
            state.payer_name.as_deref().unwrap_or("Payer"),
            state.extracted.as_ref(),
            call.duration_seconds,
        );
        if self.notifier.send(&recipients, &subject, &body).await {
            state.claimer_notified = true;
            let mut claim = claim;
            claim.claimer_notified_at = Some(Utc::now());
            if let Err(err) = self.store.update_claim(&claim).await {
                warn!(claim_id = claim.id, error = %err, "failed to stamp notification time");
            }
        }
    }

    /// Step 5 (conditional): persist the follow-up decision.
    async fn schedule_step(&self, state: &mut PostCallState) {
        let Some(call_after) = state.schedule_after else {
            return;
        };
        match self
            .store
            .create_scheduled_call(ScheduledCall {
                id: 0,
                claim_id: state.claim_id,
                call_after,
                reason: state.schedule_reason.clone(),
            })
            .await
        {
            Ok(scheduled) => info!(
                claim_id = state.claim_id,
                scheduled_id = scheduled.id,
                call_after = %call_after,
                "follow-up scheduled from call outcome"
            ),
            Err(err) => warn!(claim_id = state.claim_id, error = %err, "failed to schedule follow-up"),
        }
    }
}

/// Step 4: scan the extracted summary and next steps for follow-up intent.
///
/// Returns `(call_after, reason)` when the fixed keyword pattern matches:
/// five days out by default, overridden by an explicit "in N days" clamped
/// to [1, 30].
pub fn decide_follow_up(
    extracted: Option<&ExtractedOutcome>,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, String)> {
    let extracted = extracted?;
    let next_steps = extracted.next_steps.as_deref().unwrap_or_default().trim();
    let summary = extracted.summary.trim();
    let text = format!("{next_steps} {summary}");
    if text.trim().is_empty() || !FOLLOW_UP_KEYWORDS.is_match(&text) {
        return None;
    }

    let mut days = DEFAULT_FOLLOW_UP_DAYS;
    if let Some(caps) = IN_DAYS.captures(&text) {
        if let Ok(n) = caps[1].parse::<i64>() {
            days = n.clamp(1, 30);
        }
    }
    let reason: String = if next_steps.is_empty() { summary } else { next_steps }
        .chars()
        .take(REASON_MAX_CHARS)
        .collect();
    let reason = if reason.is_empty() {
        "Follow-up per call outcome".to_string()
    } else {
        reason
    };
    Some((now + Duration::days(days), reason))
}
