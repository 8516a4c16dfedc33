//! Voice provider integration: outbound call placement, phone normalization,
//! claim briefing context, and webhook event parsing.

mod client;
mod context;
mod phone;
mod webhook;

pub use client::{CallMetadata, CallPlacer, VoiceClient, VoiceError};
pub use context::{CallContext, build_call_context};
pub use phone::normalize_phone;
pub use webhook::WebhookEvent;
