//! Core domain types, outcome mapping tables, and shared configuration for Payerline.

pub mod config;
pub mod model;
pub mod outcome;

pub use config::Config;
pub use model::{
    Call, CallOutcome, CallStatus, Claim, ClaimStatus, IvrConfig, IvrStep, Payer, Practice,
    ScheduledCall, User,
};
pub use outcome::{ExtractedOutcome, fallback_claim_status, map_ended_reason};
