//! Domain entities for the call-lifecycle orchestrator.
//!
//! Rows here mirror the relational store. Status fields are driven only by
//! the dispatcher (claim → `in_progress` at placement) and the post-call
//! workflow's apply step; no other code path mutates them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a billing claim under collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    InProgress,
    Resolved,
    Denied,
    AppealRequired,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Denied => "denied",
            Self::AppealRequired => "appeal_required",
        }
    }
}

/// Progress of one outbound call attempt. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Pending,
    Initiated,
    InProgress,
    Ended,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Initiated => "initiated",
            Self::InProgress => "in_progress",
            Self::Ended => "ended",
        }
    }
}

/// Coarse call outcome, set exactly once when a call ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Resolved,
    ReprocessRequested,
    AppealEscalated,
    NoAnswer,
    Failed,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::ReprocessRequested => "reprocess_requested",
            Self::AppealEscalated => "appeal_escalated",
            Self::NoAnswer => "no_answer",
            Self::Failed => "failed",
        }
    }
}

/// A billing claim submitted to a payer, tracked through its status lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: i64,
    pub practice_id: i64,
    pub payer_id: i64,
    pub claim_number: String,
    pub patient_name: Option<String>,
    pub date_of_service: Option<String>,
    /// Billed amount, already formatted ("1234.56").
    pub amount: Option<String>,
    pub status: ClaimStatus,
    pub denial_reason: Option<String>,
    pub denial_code: Option<String>,
    pub notes: Option<String>,
    /// When the practice was last emailed about this claim.
    pub claimer_notified_at: Option<DateTime<Utc>>,
}

/// One outbound phone attempt tied to a claim.
///
/// `external_id` is the provider's call id and the sole correlation key for
/// webhook events, so it must be unique per provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: i64,
    pub claim_id: i64,
    pub status: CallStatus,
    pub outcome: Option<CallOutcome>,
    pub duration_seconds: Option<i64>,
    pub transcript: Option<String>,
    pub external_id: String,
    /// Structured outcome extracted from the transcript, stored opaque.
    pub extracted_data: Option<serde_json::Value>,
}

/// A deferred request to re-dispatch a claim after `call_after`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledCall {
    pub id: i64,
    pub claim_id: i64,
    pub call_after: DateTime<Utc>,
    pub reason: Option<String>,
}

/// One step of a payer's phone tree: what the IVR says and which keys go where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvrStep {
    pub prompt: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Structured IVR navigation for a payer, preferred over free-text notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvrConfig {
    #[serde(default)]
    pub steps: Vec<IvrStep>,
}

/// An insurance company reachable by phone for claim-status inquiries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payer {
    pub id: i64,
    pub practice_id: i64,
    pub name: String,
    pub phone: String,
    pub ivr_notes: Option<String>,
    pub ivr_config: Option<IvrConfig>,
    pub department_code: Option<String>,
}

/// A medical practice on whose behalf calls are placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Practice {
    pub id: i64,
    pub name: String,
    /// If set, call notifications go here instead of individual user emails.
    pub notification_email: Option<String>,
}

/// A practice staff account; active users receive call notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub practice_id: Option<i64>,
    pub email: String,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_status_serde_snake_case() {
        let json = serde_json::to_string(&ClaimStatus::AppealRequired).unwrap();
        assert_eq!(json, "\"appeal_required\"");
        let back: ClaimStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(back, ClaimStatus::InProgress);
    }

    #[test]
    fn call_outcome_as_str_matches_serde() {
        for outcome in [
            CallOutcome::Resolved,
            CallOutcome::ReprocessRequested,
            CallOutcome::AppealEscalated,
            CallOutcome::NoAnswer,
            CallOutcome::Failed,
        ] {
            let json = serde_json::to_string(&outcome).unwrap();
            assert_eq!(json, format!("\"{}\"", outcome.as_str()));
        }
    }

    #[test]
    fn ivr_config_json_shape() {
        let json = r#"{"steps": [{"prompt": "Main menu", "options": {"1": "claims", "2": "eligibility"}}]}"#;
        let config: IvrConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.steps.len(), 1);
        assert_eq!(config.steps[0].options["1"], "claims");
    }
}
