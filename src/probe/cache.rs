//! Single-slot, time-expiring cache in front of the aggregator
//!
//! Polling clients can hit the endpoint as often as they like; probes run
//! at most once per freshness window. The slot lock is held across a
//! recompute, so callers that miss at the same time share one cycle.

use crate::probe::aggregator::{AggregatedStatus, Aggregator};
use crate::probe::clock::{elapsed_between, Clock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Single cached [`AggregatedStatus`] plus the aggregator that refreshes it
///
/// Each instance owns its own slot, so tests get isolated caches.
pub struct StatusCache {
    aggregator: Aggregator,
    clock: Arc<dyn Clock>,
    freshness_window: Duration,
    slot: Mutex<Option<AggregatedStatus>>,
}

impl StatusCache {
    /// Create an empty cache; the first query always probes
    pub fn new(aggregator: Aggregator, clock: Arc<dyn Clock>, freshness_window: Duration) -> Self {
        Self {
            aggregator,
            clock,
            freshness_window,
            slot: Mutex::new(None),
        }
    }

    /// Current aggregated status, recomputed if the cached one is stale
    pub async fn current(&self) -> AggregatedStatus {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if self.is_fresh(cached) {
                return cached.clone();
            }
        }

        debug!("Status cache miss, running probe cycle");
        let status = self.aggregator.compute_status().await;
        *slot = Some(status.clone());
        status
    }

    /// Overall health, the value the HTTP surface exposes
    pub async fn is_healthy(&self) -> bool {
        self.current().await.overall
    }

    /// Cached status without probing, if any
    pub async fn last_status(&self) -> Option<AggregatedStatus> {
        self.slot.lock().await.clone()
    }

    // A timestamp in the future (clock stepped back) counts as stale
    fn is_fresh(&self, status: &AggregatedStatus) -> bool {
        elapsed_between(status.computed_at, self.clock.now())
            .is_some_and(|age| age < self.freshness_window)
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
