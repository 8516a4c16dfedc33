//! In-memory store implementations.
//!
//! One mutex guards all tables, which gives [`Store::commit_placement`] and
//! [`Store::take_due_scheduled_calls`] the same atomicity a relational
//! transaction would.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use payerline_core::{Call, Claim, ClaimStatus, Payer, Practice, ScheduledCall, User};

use crate::{CounterStore, Store, StoreError};

#[derive(Default)]
struct Tables {
    claims: HashMap<i64, Claim>,
    payers: HashMap<i64, Payer>,
    practices: HashMap<i64, Practice>,
    users: Vec<User>,
    calls: HashMap<i64, Call>,
    scheduled: Vec<ScheduledCall>,
    next_id: i64,
}

impl Tables {
    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory row store for tests and single-process deployments.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a claim, assigning its id.
    pub async fn insert_claim(&self, mut claim: Claim) -> Claim {
        let mut tables = self.inner.lock().await;
        claim.id = tables.assign_id();
        tables.claims.insert(claim.id, claim.clone());
        claim
    }

    /// Seed a payer, assigning its id.
    pub async fn insert_payer(&self, mut payer: Payer) -> Payer {
        let mut tables = self.inner.lock().await;
        payer.id = tables.assign_id();
        tables.payers.insert(payer.id, payer.clone());
        payer
    }

    /// Seed a practice, assigning its id.
    pub async fn insert_practice(&self, mut practice: Practice) -> Practice {
        let mut tables = self.inner.lock().await;
        practice.id = tables.assign_id();
        tables.practices.insert(practice.id, practice.clone());
        practice
    }

    /// Seed a user, assigning their id.
    pub async fn insert_user(&self, mut user: User) -> User {
        let mut tables = self.inner.lock().await;
        user.id = tables.assign_id();
        tables.users.push(user.clone());
        user
    }

    /// Direct call lookup by row id, for assertions.
    pub async fn call(&self, id: i64) -> Option<Call> {
        self.inner.lock().await.calls.get(&id).cloned()
    }

    /// All calls for a claim, for assertions.
    pub async fn calls_for_claim(&self, claim_id: i64) -> Vec<Call> {
        self.inner
            .lock()
            .await
            .calls
            .values()
            .filter(|c| c.claim_id == claim_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn claim(&self, id: i64) -> Result<Option<Claim>, StoreError> {
        Ok(self.inner.lock().await.claims.get(&id).cloned())
    }

    async fn update_claim(&self, claim: &Claim) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        if !tables.claims.contains_key(&claim.id) {
            return Err(StoreError::ClaimNotFound(claim.id));
        }
        tables.claims.insert(claim.id, claim.clone());
        Ok(())
    }

    async fn payer(&self, id: i64) -> Result<Option<Payer>, StoreError> {
        Ok(self.inner.lock().await.payers.get(&id).cloned())
    }

    async fn practice(&self, id: i64) -> Result<Option<Practice>, StoreError> {
        Ok(self.inner.lock().await.practices.get(&id).cloned())
    }

    async fn active_user_emails(&self, practice_id: i64) -> Result<Vec<String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .users
            .iter()
            .filter(|u| u.practice_id == Some(practice_id) && u.is_active)
            .map(|u| u.email.clone())
            .collect())
    }

    async fn call_by_external_id(&self, external_id: &str) -> Result<Option<Call>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .calls
            .values()
            .find(|c| c.external_id == external_id)
            .cloned())
    }

    async fn update_call(&self, call: &Call) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        if !tables.calls.contains_key(&call.id) {
            return Err(StoreError::CallNotFound(call.id));
        }
        tables.calls.insert(call.id, call.clone());
        Ok(())
    }

    async fn commit_placement(&self, claim_id: i64, mut call: Call) -> Result<Call, StoreError> {
        let mut tables = self.inner.lock().await;
        let Some(claim) = tables.claims.get_mut(&claim_id) else {
            return Err(StoreError::ClaimNotFound(claim_id));
        };
        claim.status = ClaimStatus::InProgress;
        call.id = tables.assign_id();
        call.claim_id = claim_id;
        tables.calls.insert(call.id, call.clone());
        Ok(call)
    }

    async fn create_scheduled_call(
        &self,
        mut scheduled: ScheduledCall,
    ) -> Result<ScheduledCall, StoreError> {
        let mut tables = self.inner.lock().await;
        scheduled.id = tables.assign_id();
        tables.scheduled.push(scheduled.clone());
        Ok(scheduled)
    }

    async fn take_due_scheduled_calls(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledCall>, StoreError> {
        let mut tables = self.inner.lock().await;
        let (due, remaining): (Vec<_>, Vec<_>) = tables
            .scheduled
            .drain(..)
            .partition(|s| s.call_after <= now);
        tables.scheduled = remaining;
        Ok(due)
    }

    async fn scheduled_calls_for_claim(
        &self,
        claim_id: i64,
    ) -> Result<Vec<ScheduledCall>, StoreError> {
        let mut rows: Vec<_> = self
            .inner
            .lock()
            .await
            .scheduled
            .iter()
            .filter(|s| s.claim_id == claim_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.call_after);
        Ok(rows)
    }
}

/// In-memory TTL counter store.
#[derive(Default)]
pub struct MemCounters {
    inner: Mutex<HashMap<String, (u64, Instant)>>,
}

impl MemCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemCounters {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let mut counters = self.inner.lock().await;
        match counters.get(key) {
            Some((count, expiry)) if *expiry > Instant::now() => Ok(Some(*count)),
            Some(_) => {
                counters.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn incr_and_expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut counters = self.inner.lock().await;
        let now = Instant::now();
        let entry = counters.entry(key.to_string()).or_insert((0, now + ttl));
        if entry.1 <= now {
            // Window lapsed between reads; start a fresh count.
            entry.0 = 0;
        }
        entry.0 += 1;
        entry.1 = now + ttl;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use payerline_core::CallStatus;

    fn claim(practice_id: i64, payer_id: i64) -> Claim {
        Claim {
            id: 0,
            practice_id,
            payer_id,
            claim_number: "CLM-100".into(),
            patient_name: Some("Jane Roe".into()),
            date_of_service: None,
            amount: None,
            status: ClaimStatus::Pending,
            denial_reason: None,
            denial_code: None,
            notes: None,
            claimer_notified_at: None,
        }
    }

    fn call(external_id: &str) -> Call {
        Call {
            id: 0,
            claim_id: 0,
            status: CallStatus::Initiated,
            outcome: None,
            duration_seconds: None,
            transcript: None,
            external_id: external_id.into(),
            extracted_data: None,
        }
    }

    #[tokio::test]
    async fn commit_placement_inserts_call_and_marks_claim() {
        let store = MemStore::new();
        let claim = store.insert_claim(claim(1, 1)).await;

        let placed = store
            .commit_placement(claim.id, call("ext-1"))
            .await
            .unwrap();
        assert!(placed.id > 0);
        assert_eq!(placed.claim_id, claim.id);

        let claim = store.claim(claim.id).await.unwrap().unwrap();
        assert_eq!(claim.status, ClaimStatus::InProgress);
    }

    #[tokio::test]
    async fn commit_placement_missing_claim_errors() {
        let store = MemStore::new();
        let result = store.commit_placement(99, call("ext-1")).await;
        assert!(matches!(result, Err(StoreError::ClaimNotFound(99))));
    }

    #[tokio::test]
    async fn call_lookup_by_external_id() {
        let store = MemStore::new();
        let claim = store.insert_claim(claim(1, 1)).await;
        store
            .commit_placement(claim.id, call("ext-abc"))
            .await
            .unwrap();

        let found = store.call_by_external_id("ext-abc").await.unwrap();
        assert!(found.is_some());
        assert!(store.call_by_external_id("ext-zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn take_due_removes_rows() {
        let store = MemStore::new();
        let claim = store.insert_claim(claim(1, 1)).await;
        let now = Utc::now();
        store
            .create_scheduled_call(ScheduledCall {
                id: 0,
                claim_id: claim.id,
                call_after: now - ChronoDuration::minutes(1),
                reason: None,
            })
            .await
            .unwrap();
        store
            .create_scheduled_call(ScheduledCall {
                id: 0,
                claim_id: claim.id,
                call_after: now + ChronoDuration::hours(1),
                reason: None,
            })
            .await
            .unwrap();

        let due = store.take_due_scheduled_calls(now).await.unwrap();
        assert_eq!(due.len(), 1);

        // The due row is gone; a second take sees nothing.
        let again = store.take_due_scheduled_calls(now).await.unwrap();
        assert!(again.is_empty());
        let remaining = store.scheduled_calls_for_claim(claim.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn active_user_emails_filters_inactive_and_other_practices() {
        let store = MemStore::new();
        store
            .insert_user(User {
                id: 0,
                practice_id: Some(1),
                email: "a@clinic.test".into(),
                is_active: true,
            })
            .await;
        store
            .insert_user(User {
                id: 0,
                practice_id: Some(1),
                email: "b@clinic.test".into(),
                is_active: false,
            })
            .await;
        store
            .insert_user(User {
                id: 0,
                practice_id: Some(2),
                email: "c@other.test".into(),
                is_active: true,
            })
            .await;

        let emails = store.active_user_emails(1).await.unwrap();
        assert_eq!(emails, vec!["a@clinic.test".to_string()]);
    }

    #[tokio::test]
    async fn counters_count_and_expire() {
        let counters = MemCounters::new();
        assert_eq!(counters.get("k").await.unwrap(), None);

        counters
            .incr_and_expire("k", Duration::from_secs(60))
            .await
            .unwrap();
        counters
            .incr_and_expire("k", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(counters.get("k").await.unwrap(), Some(2));

        // A zero TTL expires immediately.
        counters
            .incr_and_expire("gone", Duration::from_secs(0))
            .await
            .unwrap();
        assert_eq!(counters.get("gone").await.unwrap(), None);
    }
}
