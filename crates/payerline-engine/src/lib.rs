//! Call-lifecycle orchestration.
//!
//! The pieces compose in dispatch order: the [`Dispatcher`] checks claim and
//! payer eligibility, consults the [`RateLimiter`], places the call, and
//! records the bookkeeping as one unit; the [`DispatchQueue`] runs dispatch
//! jobs with retry and rate-limit cooldown; the [`ScheduledCallPoller`]
//! re-enters the queue for due follow-ups; the [`WebhookIngestor`] absorbs
//! provider events and, on the one end-of-call report per call, runs the
//! [`PostCallWorkflow`] (extract → apply → notify → decide follow-up →
//! schedule).

pub mod dispatch;
pub mod extract;
pub mod ingest;
pub mod notify;
pub mod rate_limit;
pub mod scheduling;
pub mod workflow;

mod queue;

#[cfg(test)]
pub(crate) mod testutil;

pub use dispatch::{DispatchError, DispatchOutcome, Dispatcher};
pub use extract::{ExtractionHints, NullExtractor, OutcomeExtractor, TRANSCRIPT_MAX_CHARS};
pub use ingest::WebhookIngestor;
pub use notify::{Notifier, NullNotifier};
pub use queue::DispatchQueue;
pub use rate_limit::RateLimiter;
pub use scheduling::{ScheduleError, ScheduledCallPoller, schedule_call};
pub use workflow::{PostCallState, PostCallWorkflow};
