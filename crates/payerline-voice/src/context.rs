//! Per-call conversation context built from a claim and its payer.
//!
//! The briefing is the system prompt the voice assistant runs with; the
//! opening line is the first thing it says when the call connects.

use payerline_core::{Claim, Payer};

/// Conversation context for one placed call.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Natural-language briefing: claim facts, goals, IVR navigation.
    pub briefing: String,
    /// First thing the assistant says when the call connects.
    pub opening_line: String,
}

/// Build the full conversation context for calling `payer` about `claim`.
pub fn build_call_context(claim: &Claim, payer: &Payer) -> CallContext {
    CallContext {
        briefing: build_briefing(claim, payer),
        opening_line: build_opening_line(claim),
    }
}

fn build_briefing(claim: &Claim, payer: &Payer) -> String {
    let mut parts = vec![
        "You are a professional medical billing specialist calling an insurance payer to check on a claim status.".to_string(),
        String::new(),
        "## Claim Information".to_string(),
        format!("- Claim number: {}", claim.claim_number),
        format!(
            "- Patient: {}",
            claim.patient_name.as_deref().unwrap_or("Not specified")
        ),
        format!(
            "- Date of service: {}",
            claim.date_of_service.as_deref().unwrap_or("Not specified")
        ),
        match &claim.amount {
            Some(amount) => format!("- Amount: ${amount}"),
            None => "- Amount: Not specified".to_string(),
        },
    ];
    if let Some(reason) = &claim.denial_reason {
        parts.push(format!("- Previous denial reason: {reason}"));
    }
    if let Some(code) = &claim.denial_code {
        parts.push(format!("- Denial code: {code}"));
    }

    parts.extend([
        String::new(),
        "## Your Goals".to_string(),
        "1. Get the current status of the claim".to_string(),
        "2. If denied, get the denial reason and code".to_string(),
        "3. If possible, request reprocessing or escalate to appeals".to_string(),
        "4. Note any next steps or follow-up required".to_string(),
        "5. Be professional, concise, and persistent".to_string(),
        String::new(),
    ]);

    // Structured IVR steps win over free-text notes.
    if let Some(config) = payer.ivr_config.as_ref().filter(|c| !c.steps.is_empty()) {
        parts.push("## IVR Navigation (structured)".to_string());
        for (i, step) in config.steps.iter().enumerate() {
            let options = if step.options.is_empty() {
                "—".to_string()
            } else {
                step.options
                    .iter()
                    .map(|(key, dest)| format!("\"{key}\": {dest}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            parts.push(format!(
                "Step {}: {}. Options: {}",
                i + 1,
                step.prompt,
                options
            ));
        }
        parts.push(String::new());
    } else if let Some(notes) = &payer.ivr_notes {
        parts.extend([
            "## IVR Navigation (for this payer)".to_string(),
            notes.clone(),
            String::new(),
        ]);
    }
    if let Some(code) = &payer.department_code {
        parts.push(format!("Preferred department code: {code}"));
    }

    parts.extend([
        String::new(),
        "## Payer".to_string(),
        format!("You are calling: {}", payer.name),
        String::new(),
        "Start by greeting and stating you are calling to check on a claim. Provide the claim number when asked.".to_string(),
    ]);

    parts.join("\n")
}

fn build_opening_line(claim: &Claim) -> String {
    format!(
        "Hello, I'm calling from a medical billing office to check on the status of claim number {} for patient {}. Could you help me with that?",
        claim.claim_number,
        claim.patient_name.as_deref().unwrap_or("our patient"),
    )
}
