//! Webhook ingestion for call-provider events.
//!
//! The HTTP layer hands raw JSON bodies straight through; everything here is
//! total. Unparseable bodies, unknown event types, and unmatched call ids are
//! logged and dropped so the provider always gets a 2xx back.

use std::sync::Arc;

use tracing::{debug, info, warn};

use payerline_core::outcome::map_ended_reason;
use payerline_core::{Call, CallStatus};
use payerline_store::Store;
use payerline_voice::WebhookEvent;

use crate::workflow::PostCallWorkflow;

/// Turns provider webhook bodies into call-row updates and, for end-of-call
/// reports, exactly one post-call workflow run per call.
pub struct WebhookIngestor {
    store: Arc<dyn Store>,
    workflow: Arc<PostCallWorkflow>,
}

impl WebhookIngestor {
    pub fn new(store: Arc<dyn Store>, workflow: Arc<PostCallWorkflow>) -> Self {
        Self { store, workflow }
    }

    /// Process one webhook body. Infallible by contract: every malformed or
    /// unmatched event is a logged no-op.
    pub async fn ingest(&self, body: &serde_json::Value) {
        let Some(event) = WebhookEvent::parse(body) else {
            debug!("unrecognized webhook body dropped");
            return;
        };
        match event {
            WebhookEvent::StatusUpdate {
                external_id,
                status,
            } => self.handle_status_update(&external_id, &status).await,
            WebhookEvent::EndOfCallReport {
                external_id,
                transcript,
                ended_reason,
                duration_seconds,
            } => {
                self.handle_report(&external_id, transcript, &ended_reason, duration_seconds)
                    .await
            }
        }
    }

    async fn lookup(&self, external_id: &str) -> Option<Call> {
        match self.store.call_by_external_id(external_id).await {
            Ok(Some(call)) => Some(call),
            Ok(None) => {
                warn!(external_id, "webhook for unknown call dropped");
                None
            }
            Err(err) => {
                warn!(external_id, error = %err, "call lookup failed, webhook dropped");
                None
            }
        }
    }

    async fn handle_status_update(&self, external_id: &str, status: &str) {
        let Some(mut call) = self.lookup(external_id).await else {
            return;
        };
        // An ended call never moves back; late or duplicate pings are no-ops.
        if call.status == CallStatus::Ended {
            debug!(call_id = call.id, status, "status update after end ignored");
            return;
        }
        let next = match status {
            "in-progress" => CallStatus::InProgress,
            "ended" => CallStatus::Ended,
            other => {
                debug!(call_id = call.id, status = other, "unhandled call status");
                return;
            }
        };
        call.status = next;
        match self.store.update_call(&call).await {
            Ok(()) => info!(call_id = call.id, status = next.as_str(), "call status updated"),
            Err(err) => warn!(call_id = call.id, error = %err, "failed to update call status"),
        }
    }

    async fn handle_report(
        &self,
        external_id: &str,
        transcript: String,
        ended_reason: &str,
        duration_seconds: Option<i64>,
    ) {
        let Some(mut call) = self.lookup(external_id).await else {
            return;
        };
        // Only reports set an outcome, so its presence marks the workflow as
        // already run for this call. Duplicate deliveries stop here.
        if call.outcome.is_some() {
            debug!(call_id = call.id, "duplicate end-of-call report dropped");
            return;
        }

        let outcome = map_ended_reason(ended_reason);
        call.status = CallStatus::Ended;
        call.outcome = Some(outcome);
        call.duration_seconds = duration_seconds;
        call.transcript = Some(transcript).filter(|t| !t.trim().is_empty());
        if let Err(err) = self.store.update_call(&call).await {
            warn!(call_id = call.id, error = %err, "failed to persist end-of-call report");
            return;
        }
        info!(
            call_id = call.id,
            claim_id = call.claim_id,
            ended_reason,
            outcome = outcome.as_str(),
            "end-of-call report received"
        );
        self.workflow.run(&call).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchOutcome, Dispatcher};
    use crate::extract::NullExtractor;
    use crate::rate_limit::RateLimiter;
    use crate::testutil::{FakePlacer, RecordingNotifier, ScriptedExtractor, sample_outcome, seed};
    use payerline_core::config::{NotifyConfig, RateLimitConfig};
    use payerline_core::{CallOutcome, ClaimStatus};
    use payerline_store::{MemCounters, MemStore};
    use serde_json::json;

    fn ingestor_with(
        store: Arc<MemStore>,
        extractor: Arc<dyn crate::extract::OutcomeExtractor>,
    ) -> WebhookIngestor {
        let workflow = PostCallWorkflow::new(
            store.clone(),
            extractor,
            Arc::new(RecordingNotifier::new(false)),
            NotifyConfig::default(),
        );
        WebhookIngestor::new(store, Arc::new(workflow))
    }

    async fn placed_call(store: &Arc<MemStore>) -> (i64, String) {
        let (_, _, claim) = seed(store).await;
        let dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(FakePlacer::new()),
            RateLimiter::new(Arc::new(MemCounters::new()), RateLimitConfig::default()),
        );
        match dispatcher.dispatch(claim.id).await.unwrap() {
            DispatchOutcome::Placed {
                call_id,
                external_id,
            } => (call_id, external_id),
            other => panic!("expected placement, got {other:?}"),
        }
    }

    fn status_body(external_id: &str, status: &str) -> serde_json::Value {
        json!({"message": {"type": "status-update", "status": status, "call": {"id": external_id}}})
    }

    fn report_body(external_id: &str, transcript: &str, ended_reason: &str) -> serde_json::Value {
        json!({"message": {
            "type": "end-of-call-report",
            "endedReason": ended_reason,
            "artifact": {"transcript": transcript},
            "call": {"id": external_id, "durationSeconds": 63},
        }})
    }

    #[tokio::test]
    async fn status_updates_move_the_call_forward() {
        let store = Arc::new(MemStore::new());
        let (call_id, external_id) = placed_call(&store).await;
        let ingestor = ingestor_with(store.clone(), Arc::new(NullExtractor));

        ingestor.ingest(&status_body(&external_id, "in-progress")).await;
        assert_eq!(store.call(call_id).await.unwrap().status, CallStatus::InProgress);

        ingestor.ingest(&status_body(&external_id, "ended")).await;
        assert_eq!(store.call(call_id).await.unwrap().status, CallStatus::Ended);

        // Ended is terminal.
        ingestor.ingest(&status_body(&external_id, "in-progress")).await;
        assert_eq!(store.call(call_id).await.unwrap().status, CallStatus::Ended);
    }

    #[tokio::test]
    async fn malformed_and_unmatched_bodies_are_no_ops() {
        let store = Arc::new(MemStore::new());
        let (call_id, _) = placed_call(&store).await;
        let ingestor = ingestor_with(store.clone(), Arc::new(NullExtractor));

        ingestor.ingest(&json!({"garbage": true})).await;
        ingestor.ingest(&json!("not even an object")).await;
        ingestor.ingest(&status_body("no-such-call", "ended")).await;

        assert_eq!(store.call(call_id).await.unwrap().status, CallStatus::Initiated);
    }

    #[tokio::test]
    async fn report_records_outcome_and_runs_workflow() {
        let store = Arc::new(MemStore::new());
        let (call_id, external_id) = placed_call(&store).await;
        let ingestor = ingestor_with(
            store.clone(),
            Arc::new(ScriptedExtractor::returning(sample_outcome("paid", None))),
        );

        ingestor
            .ingest(&report_body(&external_id, "claim confirmed paid", "customer-ended-call"))
            .await;

        let call = store.call(call_id).await.unwrap();
        assert_eq!(call.status, CallStatus::Ended);
        assert_eq!(call.outcome, Some(CallOutcome::Resolved));
        assert_eq!(call.duration_seconds, Some(63));
        assert_eq!(call.transcript.as_deref(), Some("claim confirmed paid"));

        let claim = store.claim(call.claim_id).await.unwrap().unwrap();
        assert_eq!(claim.status, ClaimStatus::Resolved);
    }

    #[tokio::test]
    async fn duplicate_report_runs_workflow_once() {
        let store = Arc::new(MemStore::new());
        let (call_id, external_id) = placed_call(&store).await;
        let extractor = Arc::new(ScriptedExtractor::returning(sample_outcome("paid", None)));
        let ingestor = ingestor_with(store.clone(), extractor.clone());

        let body = report_body(&external_id, "claim confirmed paid", "hangup");
        ingestor.ingest(&body).await;
        ingestor.ingest(&body).await;

        assert_eq!(extractor.seen_transcripts.lock().unwrap().len(), 1);
        assert_eq!(
            store.call(call_id).await.unwrap().outcome,
            Some(CallOutcome::Resolved)
        );
    }

    #[tokio::test]
    async fn report_after_status_ended_still_runs_workflow() {
        let store = Arc::new(MemStore::new());
        let (_, external_id) = placed_call(&store).await;
        let extractor = Arc::new(ScriptedExtractor::returning(sample_outcome("paid", None)));
        let ingestor = ingestor_with(store.clone(), extractor.clone());

        // A terse "ended" ping can beat the full report; the report must
        // still trigger the workflow, exactly once.
        ingestor.ingest(&status_body(&external_id, "ended")).await;
        ingestor
            .ingest(&report_body(&external_id, "claim paid", "hangup"))
            .await;

        assert_eq!(extractor.seen_transcripts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_answer_report_returns_claim_to_pending() {
        let store = Arc::new(MemStore::new());
        let (call_id, external_id) = placed_call(&store).await;
        let ingestor = ingestor_with(store.clone(), Arc::new(NullExtractor));

        ingestor.ingest(&report_body(&external_id, "", "no-answer")).await;

        let call = store.call(call_id).await.unwrap();
        assert_eq!(call.outcome, Some(CallOutcome::NoAnswer));
        assert_eq!(call.transcript, None);
        let claim = store.claim(call.claim_id).await.unwrap().unwrap();
        assert_eq!(claim.status, ClaimStatus::Pending);
    }

    // Full pass without an extractor: dispatch, report, fallback resolution,
    // and no follow-up since nothing was extracted.
    #[tokio::test]
    async fn end_to_end_report_without_extractor() {
        let store = Arc::new(MemStore::new());
        let (call_id, external_id) = placed_call(&store).await;
        let ingestor = ingestor_with(store.clone(), Arc::new(NullExtractor));

        let claim_id = store.call(call_id).await.unwrap().claim_id;
        assert_eq!(
            store.claim(claim_id).await.unwrap().unwrap().status,
            ClaimStatus::InProgress
        );

        ingestor
            .ingest(&report_body(
                &external_id,
                "the claim was reprocessed, check back in 7 days",
                "customer-ended-call",
            ))
            .await;

        let call = store.call(call_id).await.unwrap();
        assert_eq!(call.status, CallStatus::Ended);
        assert_eq!(call.outcome, Some(CallOutcome::Resolved));
        assert_eq!(call.duration_seconds, Some(63));
        assert_eq!(
            call.transcript.as_deref(),
            Some("the claim was reprocessed, check back in 7 days")
        );

        let claim = store.claim(claim_id).await.unwrap().unwrap();
        assert_eq!(claim.status, ClaimStatus::Resolved);
        assert!(store
            .scheduled_calls_for_claim(claim_id)
            .await
            .unwrap()
            .is_empty());
    }
}
