//! Outcome mapping tables.
//!
//! Two fixed mappings drive the post-call pipeline: the provider's free-text
//! ended reason → a coarse [`CallOutcome`], and an extracted structured
//! outcome → the claim's next [`ClaimStatus`]. Both are deliberately small
//! keyword tables, not classifiers.

use serde::{Deserialize, Serialize};

use crate::model::{CallOutcome, ClaimStatus};

/// Structured outcome extracted from a call transcript.
///
/// Produced by the extractor boundary; `claim_status` is the payer's answer
/// in the payer's own vocabulary (`paid`, `denied`, `reprocessing`, ...),
/// mapped to a [`ClaimStatus`] by [`ExtractedOutcome::claim_status_update`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedOutcome {
    pub claim_status: String,
    #[serde(default)]
    pub denial_reason: Option<String>,
    #[serde(default)]
    pub denial_code: Option<String>,
    #[serde(default)]
    pub action_taken: Option<String>,
    #[serde(default)]
    pub next_steps: Option<String>,
    #[serde(default)]
    pub amount_paid: Option<String>,
    pub summary: String,
}

impl ExtractedOutcome {
    /// Map this outcome to the claim's next status.
    ///
    /// Precedence, highest first:
    /// 1. `action_taken` mentions an appeal → `AppealRequired`
    /// 2. `action_taken` mentions reprocessing → `InProgress`
    /// 3. `claim_status` is `paid`/`resolved` → `Resolved`
    /// 4. direct lookup table, defaulting to `Pending` for unmapped values
    pub fn claim_status_update(&self) -> ClaimStatus {
        let action = self
            .action_taken
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        if action.contains("appeal") {
            return ClaimStatus::AppealRequired;
        }
        if action.contains("reprocess") {
            return ClaimStatus::InProgress;
        }
        match self.claim_status.to_lowercase().as_str() {
            "paid" | "resolved" => ClaimStatus::Resolved,
            "reprocessing" | "reprocess_requested" => ClaimStatus::InProgress,
            "denied" => ClaimStatus::Denied,
            "appeal_required" => ClaimStatus::AppealRequired,
            _ => ClaimStatus::Pending,
        }
    }
}

/// Map the provider's free-text ended reason to a coarse call outcome.
///
/// Unrecognized reasons default to `Resolved`. That routes unknown provider
/// outcomes into "success" and is preserved as-is pending product input.
pub fn map_ended_reason(reason: &str) -> CallOutcome {
    let reason = reason.to_lowercase();
    if reason.contains("hangup") || reason.contains("completed") {
        return CallOutcome::Resolved;
    }
    if reason.contains("no-answer") || reason.contains("no_answer") || reason.contains("busy") {
        return CallOutcome::NoAnswer;
    }
    if reason.contains("failed") || reason.contains("error") {
        return CallOutcome::Failed;
    }
    CallOutcome::Resolved
}

/// Fallback claim-status update when no structured outcome was extracted.
///
/// `None` means the claim is left untouched.
pub fn fallback_claim_status(outcome: CallOutcome) -> Option<ClaimStatus> {
    match outcome {
        CallOutcome::Resolved | CallOutcome::ReprocessRequested => Some(ClaimStatus::Resolved),
        CallOutcome::NoAnswer => Some(ClaimStatus::Pending),
        _ => None,
    }
}
