//! Provider health tracking
//!
//! Process-wide registry of rolling health records, one per provider, mutated
//! only by the executor after each attempt. Records live behind a sharded map
//! so updates for one provider never contend with another's.

pub mod stats;

use dashmap::DashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::providers::ProviderId;

pub use stats::{HealthStat, STALE_AFTER_SECS, UNHEALTHY_AFTER};

/// Registry of per-provider health records.
#[derive(Debug, Default)]
pub struct HealthTracker {
    stats: DashMap<ProviderId, HealthStat>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed attempt. Cancelled attempts are not provider
    /// failures and must not be passed here.
    pub fn record(&self, provider: ProviderId, success: bool, latency_ms: u64) {
        self.record_at(provider, success, latency_ms, now_secs());
    }

    fn record_at(&self, provider: ProviderId, success: bool, latency_ms: u64, now_secs: u64) {
        let mut entry = self.stats.entry(provider).or_default();
        entry.refresh(now_secs);
        if success {
            entry.record_success(latency_ms, now_secs);
        } else {
            entry.record_failure(now_secs);
        }
    }

    /// Current record for a provider, with the staleness reset applied.
    /// `None` when the provider has never been attempted.
    pub fn snapshot(&self, provider: ProviderId) -> Option<HealthStat> {
        let now = now_secs();
        let mut entry = self.stats.get_mut(&provider)?;
        entry.refresh(now);
        Some(entry.clone())
    }

    /// Providers whose records have gone quiet long enough to be probe
    /// candidates.
    pub fn stale_providers(&self) -> Vec<ProviderId> {
        let now = now_secs();
        self.stats
            .iter()
            .filter(|entry| entry.value().is_stale(now))
            .map(|entry| *entry.key())
            .collect()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
