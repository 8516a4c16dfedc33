//! Provider webhook envelope parsing.
//!
//! The provider posts loosely-typed JSON: a `message` wrapper (sometimes
//! absent), a `type` discriminator, and a call object whose id has shown up
//! under several field names. Parsing is defensive; anything unrecognized
//! becomes `None` and the caller acknowledges and drops it.

use serde_json::Value;

/// A recognized webhook event, correlated by the provider's call id.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    /// Lightweight progress ping (`in-progress`, `ended`, ...).
    StatusUpdate { external_id: String, status: String },
    /// Full end-of-call report; the sole trigger for the post-call pipeline.
    EndOfCallReport {
        external_id: String,
        transcript: String,
        ended_reason: String,
        duration_seconds: Option<i64>,
    },
}

impl WebhookEvent {
    /// Parse a webhook body. `None` means the event should be acknowledged
    /// and dropped: unknown type, missing call id, or malformed shape.
    pub fn parse(body: &Value) -> Option<Self> {
        let msg = match body.get("message") {
            Some(message) if message.is_object() => message,
            _ => body,
        };
        let msg_type = msg.get("type")?.as_str()?;
        let call = msg.get("call").cloned().unwrap_or(Value::Null);
        let external_id = extract_provider_id(&call)?;

        match msg_type {
            "status-update" => Some(Self::StatusUpdate {
                external_id,
                status: msg
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            "end-of-call-report" => {
                let transcript = msg
                    .get("artifact")
                    .and_then(|a| a.get("transcript"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let ended_reason = msg
                    .get("endedReason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let duration_seconds = call
                    .get("duration")
                    .or_else(|| call.get("durationSeconds"))
                    .and_then(as_seconds);
                Some(Self::EndOfCallReport {
                    external_id,
                    transcript,
                    ended_reason,
                    duration_seconds,
                })
            }
            _ => None,
        }
    }
}

fn as_seconds(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

/// Pull the provider call id out of a loosely-typed call object.
///
/// Seen shapes: `{"id": "..."}`, `{"callId": "..."}`, `{"id": {"id": "..."}}`.
pub(crate) fn extract_provider_id(value: &Value) -> Option<String> {
    for key in ["id", "callId"] {
        match value.get(key) {
            Some(Value::String(id)) if !id.is_empty() => return Some(id.clone()),
            Some(Value::Object(nested)) => {
                if let Some(Value::String(id)) = nested.get("id") {
                    if !id.is_empty() {
                        return Some(id.clone());
                    }
                }
            }
            _ => {}
        }
    }
    None
}
