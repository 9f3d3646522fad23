//! Rolling per-provider health statistics

use serde::{Deserialize, Serialize};

/// Consecutive failures after which a provider is considered unhealthy.
pub const UNHEALTHY_AFTER: u32 = 3;
/// Seconds of silence after which a record is stale and re-enters healthy.
pub const STALE_AFTER_SECS: u64 = 300;

/// Rolling success/error statistics for one provider.
///
/// A record with no data is healthy (optimistic start); latency is a bounded
/// cumulative mean updated only on success, and the error rate is an
/// exponential moving average with weight 0.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStat {
    pub healthy: bool,
    /// Unix seconds.
    pub last_success_ts: Option<u64>,
    /// Unix seconds.
    pub last_failure_ts: Option<u64>,
    pub consecutive_failures: u32,
    pub ewma_latency_ms: u64,
    pub error_rate: f32,
    pub total_requests: u64,
    pub successful_requests: u64,
}

impl HealthStat {
    pub fn new() -> Self {
        Self {
            healthy: true,
            last_success_ts: None,
            last_failure_ts: None,
            consecutive_failures: 0,
            ewma_latency_ms: 0,
            error_rate: 0.0,
            total_requests: 0,
            successful_requests: 0,
        }
    }

    /// Fold in a successful attempt.
    pub fn record_success(&mut self, latency_ms: u64, now_secs: u64) {
        self.total_requests += 1;
        self.successful_requests += 1;

        // Cumulative mean in wide arithmetic so long uptimes cannot overflow.
        let n = self.total_requests as u128;
        let blended = ((n - 1) * self.ewma_latency_ms as u128 + latency_ms as u128) / n;
        self.ewma_latency_ms = blended.min(u64::MAX as u128) as u64;

        self.error_rate *= 0.9;
        self.consecutive_failures = 0;
        self.last_success_ts = Some(now_secs);
        self.healthy = true;
    }

    /// Fold in a failed attempt. Latency is not sampled on failures.
    pub fn record_failure(&mut self, now_secs: u64) {
        self.total_requests += 1;
        self.error_rate = self.error_rate * 0.9 + 0.1;
        self.consecutive_failures += 1;
        self.last_failure_ts = Some(now_secs);
        self.healthy = self.consecutive_failures < UNHEALTHY_AFTER;
    }

    /// Most recent activity of either kind, unix seconds.
    pub fn last_activity_ts(&self) -> Option<u64> {
        match (self.last_success_ts, self.last_failure_ts) {
            (Some(s), Some(f)) => Some(s.max(f)),
            (Some(s), None) => Some(s),
            (None, Some(f)) => Some(f),
            (None, None) => None,
        }
    }

    /// Whether the record has seen no activity for `STALE_AFTER_SECS`.
    pub fn is_stale(&self, now_secs: u64) -> bool {
        match self.last_activity_ts() {
            Some(ts) => now_secs.saturating_sub(ts) > STALE_AFTER_SECS,
            None => false,
        }
    }

    /// Optimistic re-entry: a stale record forgets its failure streak.
    pub fn refresh(&mut self, now_secs: u64) {
        if self.is_stale(now_secs) {
            self.consecutive_failures = 0;
            self.healthy = true;
        }
    }
}

impl Default for HealthStat {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_is_healthy() {
        let stat = HealthStat::new();
        assert!(stat.healthy);
        assert_eq!(stat.total_requests, 0);
        assert!(!stat.is_stale(1_000_000));
    }

    #[test]
    fn test_success_increments_both_counters() {
        let mut stat = HealthStat::new();
        stat.record_success(100, 10);

        assert_eq!(stat.total_requests, 1);
        assert_eq!(stat.successful_requests, 1);
        assert_eq!(stat.ewma_latency_ms, 100);
        assert_eq!(stat.last_success_ts, Some(10));
    }

    #[test]
    fn test_failure_increments_total_only() {
        let mut stat = HealthStat::new();
        stat.record_failure(10);

        assert_eq!(stat.total_requests, 1);
        assert_eq!(stat.successful_requests, 0);
        assert_eq!(stat.ewma_latency_ms, 0, "latency updates only on success");
    }

    #[test]
    fn test_latency_is_cumulative_mean() {
        let mut stat = HealthStat::new();
        stat.record_success(100, 1);
        stat.record_success(300, 2);
        assert_eq!(stat.ewma_latency_ms, 200);

        // A failure raises n without touching the stored mean, so the next
        // success blends over three requests' weight.
        stat.record_failure(3);
        stat.record_success(200, 4);
        assert_eq!(stat.ewma_latency_ms, 200);
    }

    #[test]
    fn test_error_rate_decay_and_bump() {
        let mut stat = HealthStat::new();
        stat.record_failure(1);
        assert!((stat.error_rate - 0.1).abs() < f32::EPSILON);

        stat.record_failure(2);
        assert!((stat.error_rate - 0.19).abs() < 1e-6);

        stat.record_success(50, 3);
        assert!((stat.error_rate - 0.171).abs() < 1e-6);
    }

    #[test]
    fn test_unhealthy_after_three_consecutive_failures() {
        let mut stat = HealthStat::new();
        stat.record_failure(1);
        stat.record_failure(2);
        assert!(stat.healthy);

        stat.record_failure(3);
        assert!(!stat.healthy);
        assert_eq!(stat.consecutive_failures, 3);

        stat.record_success(10, 4);
        assert!(stat.healthy);
        assert_eq!(stat.consecutive_failures, 0);
    }

    #[test]
    fn test_staleness_and_refresh() {
        let mut stat = HealthStat::new();
        stat.record_failure(100);
        stat.record_failure(101);
        stat.record_failure(102);
        assert!(!stat.healthy);

        assert!(!stat.is_stale(102 + STALE_AFTER_SECS));
        assert!(stat.is_stale(103 + STALE_AFTER_SECS));

        stat.refresh(103 + STALE_AFTER_SECS);
        assert!(stat.healthy);
        assert_eq!(stat.consecutive_failures, 0);
        // Lifetime counters survive the reset.
        assert_eq!(stat.total_requests, 3);
    }
}
