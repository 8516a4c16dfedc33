//! Per-payer call-rate ceiling over a TTL-windowed counter.
//!
//! Fixed, non-sliding window: each increment extends the TTL, so bursts can
//! keep a payer capped longer than the nominal window. Counter-store errors
//! fail open — availability over strict enforcement.

use std::sync::Arc;

use payerline_core::config::RateLimitConfig;
use payerline_store::CounterStore;
use tracing::warn;

/// Shared call-rate limiter keyed by payer id.
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(counters: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { counters, config }
    }

    fn key(payer_id: i64) -> String {
        format!("call_rate:payer:{payer_id}")
    }

    /// Whether a call to this payer is currently allowed.
    ///
    /// Counter-store errors return `true` (fail open).
    pub async fn allow(&self, payer_id: i64) -> bool {
        match self.counters.get(&Self::key(payer_id)).await {
            Ok(Some(count)) => count < self.config.max_calls_per_payer,
            Ok(None) => true,
            Err(err) => {
                warn!(payer_id, error = %err, "counter store unavailable, failing open");
                true
            }
        }
    }

    /// Record a successful placement: increment the counter and (re)set its
    /// expiry to the window length. Best-effort; errors are swallowed.
    pub async fn record(&self, payer_id: i64) {
        if let Err(err) = self
            .counters
            .incr_and_expire(&Self::key(payer_id), self.config.window())
            .await
        {
            warn!(payer_id, error = %err, "failed to record rate-limit counter");
        }
    }
}
