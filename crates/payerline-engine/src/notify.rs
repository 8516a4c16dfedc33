//! Claimer notification: recipient resolution and message composition.
//!
//! Delivery itself is an external collaborator behind [`Notifier`]. Failures
//! never propagate; the post-call pipeline treats a failed send as "not
//! notified" and moves on.

use async_trait::async_trait;
use payerline_core::{Claim, ExtractedOutcome};
use payerline_store::Store;
use tracing::{debug, warn};

/// Delivery seam: addresses + subject + body in, success out.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> bool;
}

/// Notifier for deployments without mail configured; always reports "not sent".
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, to: &[String], subject: &str, _body: &str) -> bool {
        debug!(recipients = to.len(), subject, "mail not configured, notification skipped");
        false
    }
}

/// Resolve who gets notified for a practice: the practice-level override
/// address if set, else every active user's email. Store errors resolve to
/// no recipients (the notify step is then a no-op).
pub async fn resolve_recipients(store: &dyn Store, practice_id: i64) -> Vec<String> {
    match store.practice(practice_id).await {
        Ok(Some(practice)) => {
            if let Some(email) = practice
                .notification_email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
            {
                return vec![email.to_string()];
            }
        }
        Ok(None) => return Vec::new(),
        Err(err) => {
            warn!(practice_id, error = %err, "practice lookup failed, skipping notification");
            return Vec::new();
        }
    }
    match store.active_user_emails(practice_id).await {
        Ok(emails) => emails,
        Err(err) => {
            warn!(practice_id, error = %err, "user lookup failed, skipping notification");
            Vec::new()
        }
    }
}

/// Compose the fixed-shape call-update message. Returns (subject, body).
pub fn compose_notification(
    app_name: &str,
    claim: &Claim,
    payer_name: &str,
    extracted: Option<&ExtractedOutcome>,
    duration_seconds: Option<i64>,
) -> (String, String) {
    let subject = format!(
        "[{app_name}] Call update: Claim {} – {}",
        claim.claim_number,
        claim.status.as_str()
    );

    let duration = duration_seconds
        .map(|s| format!("{s}s"))
        .unwrap_or_else(|| "—".to_string());
    let mut lines = vec![
        "Claim call update".to_string(),
        String::new(),
        "Your automated call for this claim has completed. Here is the update.".to_string(),
        String::new(),
        format!("Claim #: {}", claim.claim_number),
        format!("Patient: {}", claim.patient_name.as_deref().unwrap_or("—")),
        format!("Payer: {payer_name}"),
        format!("Status: {}", claim.status.as_str()),
        format!("Call duration: {duration}"),
    ];
    if let Some(extracted) = extracted {
        let summary = extracted.summary.trim();
        if !summary.is_empty() {
            lines.push(String::new());
            lines.push(format!("Summary: {summary}"));
        }
        if let Some(next_steps) = extracted.next_steps.as_deref().map(str::trim) {
            if !next_steps.is_empty() {
                lines.push(format!("Next steps: {next_steps}"));
            }
        }
        if extracted.denial_reason.is_some() || extracted.denial_code.is_some() {
            lines.push(format!(
                "Denial: {} ({})",
                extracted.denial_reason.as_deref().unwrap_or(""),
                extracted.denial_code.as_deref().unwrap_or("")
            ));
        }
    }
    lines.push(String::new());
    lines.push(format!("This is an automated message from {app_name}."));

    (subject, lines.join("\n"))
}
