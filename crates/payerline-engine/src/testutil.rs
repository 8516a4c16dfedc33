//! Shared test doubles and seed data for the orchestration tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use payerline_core::{Claim, ClaimStatus, ExtractedOutcome, Payer, Practice};
use payerline_store::{CounterStore, MemStore, StoreError};
use payerline_voice::{CallContext, CallMetadata, CallPlacer, VoiceError};

use crate::extract::{ExtractionHints, OutcomeExtractor};
use crate::notify::Notifier;

/// Counter store that always errors, for fail-open assertions.
pub(crate) struct FailingCounters;

#[async_trait]
impl CounterStore for FailingCounters {
    async fn get(&self, _key: &str) -> Result<Option<u64>, StoreError> {
        Err(StoreError::Unavailable("injected counter failure".into()))
    }

    async fn incr_and_expire(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("injected counter failure".into()))
    }
}

/// Scripted call placer: succeeds with sequential external ids after an
/// optional number of injected provider failures.
pub(crate) struct FakePlacer {
    pub placed: Mutex<Vec<String>>,
    failures_remaining: AtomicU32,
    always_fail: bool,
    next_id: AtomicU64,
}

impl FakePlacer {
    pub fn new() -> Self {
        Self::failing_first(0)
    }

    pub fn failing_first(failures: u32) -> Self {
        Self {
            placed: Mutex::new(Vec::new()),
            failures_remaining: AtomicU32::new(failures),
            always_fail: false,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self {
            placed: Mutex::new(Vec::new()),
            failures_remaining: AtomicU32::new(0),
            always_fail: true,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn placement_count(&self) -> usize {
        self.placed.lock().unwrap().len()
    }
}

#[async_trait]
impl CallPlacer for FakePlacer {
    async fn place(
        &self,
        phone: &str,
        _context: &CallContext,
        _metadata: &CallMetadata,
    ) -> Result<String, VoiceError> {
        if self.always_fail
            || self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(VoiceError::Provider {
                status: 502,
                body: "injected provider failure".into(),
            });
        }
        self.placed.lock().unwrap().push(phone.to_string());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("ext-{id}"))
    }
}

/// Extractor that always returns the scripted outcome.
pub(crate) struct ScriptedExtractor {
    pub outcome: Option<ExtractedOutcome>,
    pub seen_transcripts: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn returning(outcome: ExtractedOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            seen_transcripts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl OutcomeExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        transcript: &str,
        _hints: &ExtractionHints,
    ) -> Option<ExtractedOutcome> {
        self.seen_transcripts
            .lock()
            .unwrap()
            .push(transcript.to_string());
        self.outcome.clone()
    }
}

/// Notifier that records every send and reports the scripted result.
pub(crate) struct RecordingNotifier {
    pub sent: Mutex<Vec<(Vec<String>, String, String)>>,
    pub succeed: bool,
}

impl RecordingNotifier {
    pub fn new(succeed: bool) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            succeed,
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_vec(), subject.to_string(), body.to_string()));
        self.succeed
    }
}

pub(crate) fn sample_claim(practice_id: i64, payer_id: i64) -> Claim {
    Claim {
        id: 0,
        practice_id,
        payer_id,
        claim_number: "CLM-100".into(),
        patient_name: Some("Jane Roe".into()),
        date_of_service: Some("2026-01-15".into()),
        amount: Some("412.50".into()),
        status: ClaimStatus::Pending,
        denial_reason: None,
        denial_code: None,
        notes: None,
        claimer_notified_at: None,
    }
}

pub(crate) fn sample_outcome(claim_status: &str, action_taken: Option<&str>) -> ExtractedOutcome {
    ExtractedOutcome {
        claim_status: claim_status.into(),
        denial_reason: None,
        denial_code: None,
        action_taken: action_taken.map(Into::into),
        next_steps: None,
        amount_paid: None,
        summary: "Spoke with the payer about the claim.".into(),
    }
}

/// Seed a practice, payer, and pending claim into a fresh store.
pub(crate) async fn seed(store: &MemStore) -> (Practice, Payer, Claim) {
    let practice = store
        .insert_practice(Practice {
            id: 0,
            name: "North Clinic".into(),
            notification_email: None,
        })
        .await;
    let payer = store
        .insert_payer(Payer {
            id: 0,
            practice_id: practice.id,
            name: "Acme Health".into(),
            phone: "5551234567".into(),
            ivr_notes: None,
            ivr_config: None,
            department_code: None,
        })
        .await;
    let claim = store
        .insert_claim(sample_claim(practice.id, payer.id))
        .await;
    (practice, payer, claim)
}
