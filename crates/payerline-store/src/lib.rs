//! Storage seam: row access for claims/calls/scheduled calls and the
//! rate-limit counter store.
//!
//! The orchestrator talks to these traits only. A relational backend is
//! assumed but deliberately out of scope; [`MemStore`] and [`MemCounters`]
//! back tests and single-process deployments. [`Store::commit_placement`]
//! exists so a placed call and its claim bookkeeping land as one unit.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payerline_core::{Call, Claim, Payer, Practice, ScheduledCall};

mod error;
mod mem;

pub use error::StoreError;
pub use mem::{MemCounters, MemStore};

/// Row storage for the orchestrator's entities.
///
/// Single-row reads and writes; each method is one transaction against the
/// backing store. No method spans rows of different claims.
#[async_trait]
pub trait Store: Send + Sync {
    async fn claim(&self, id: i64) -> Result<Option<Claim>, StoreError>;

    /// Overwrite a claim row. Errors if the claim no longer exists.
    async fn update_claim(&self, claim: &Claim) -> Result<(), StoreError>;

    async fn payer(&self, id: i64) -> Result<Option<Payer>, StoreError>;

    async fn practice(&self, id: i64) -> Result<Option<Practice>, StoreError>;

    /// Emails of active users attached to a practice, for notifications.
    async fn active_user_emails(&self, practice_id: i64) -> Result<Vec<String>, StoreError>;

    /// Look up a call by the provider's external id, the sole webhook
    /// correlation key.
    async fn call_by_external_id(&self, external_id: &str) -> Result<Option<Call>, StoreError>;

    /// Overwrite a call row. Errors if the call no longer exists.
    async fn update_call(&self, call: &Call) -> Result<(), StoreError>;

    /// Commit placement bookkeeping as one unit: insert the call row
    /// (assigning its id) and mark the claim `in_progress`.
    async fn commit_placement(&self, claim_id: i64, call: Call) -> Result<Call, StoreError>;

    /// Insert a scheduled follow-up call, assigning its id.
    async fn create_scheduled_call(
        &self,
        scheduled: ScheduledCall,
    ) -> Result<ScheduledCall, StoreError>;

    /// Atomically select-and-delete every scheduled call due at `now`.
    ///
    /// Selection and deletion are one unit so a second poll tick cannot see
    /// the same row again.
    async fn take_due_scheduled_calls(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledCall>, StoreError>;

    /// Pending scheduled calls for one claim, ordered by `call_after`.
    async fn scheduled_calls_for_claim(
        &self,
        claim_id: i64,
    ) -> Result<Vec<ScheduledCall>, StoreError>;
}

/// TTL-windowed counters backing the per-payer rate limiter.
///
/// The one piece of shared state needing atomic read-modify-write. Counters
/// are ephemeral; callers treat errors as "store unavailable" and fail open.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current count for `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Increment `key` and (re)set its expiry to `ttl` as one operation.
    async fn incr_and_expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;
}
