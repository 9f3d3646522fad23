//! Per-provider circuit breaker
//!
//! Three-state failure isolation: `Closed` passes requests and counts
//! consecutive failures, `Open` rejects locally until the cool-down elapses,
//! `HalfOpen` lets exactly one probe through and snaps back to `Open` on
//! failure. `may_request` is the only gate exposed upward; `record_success`
//! and `record_failure` are the only mutators. All operations are
//! constant-time and safe under concurrent executor tasks.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::providers::ProviderId;
use crate::core::types::BreakerStateView;

/// Consecutive failures that trip the breaker.
pub const FAILURE_THRESHOLD: u32 = 5;
/// How long an open breaker rejects before allowing a probe.
pub const COOL_DOWN_MS: u64 = 60_000;

/// Breaker state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    /// Tripped at the contained timestamp (unix milliseconds).
    Open { since_ms: u64 },
    /// A single probe is in flight.
    HalfOpen,
}

impl BreakerState {
    pub fn view(self) -> BreakerStateView {
        match self {
            BreakerState::Closed => BreakerStateView::Closed,
            BreakerState::Open { .. } => BreakerStateView::Open,
            BreakerState::HalfOpen => BreakerStateView::HalfOpen,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

/// Circuit breaker for one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
        }
    }

    /// Whether a request may be issued now.
    ///
    /// An open breaker whose cool-down has elapsed transitions to `HalfOpen`
    /// and admits the calling task as the single probe; concurrent callers
    /// see `false` until the probe resolves.
    pub fn may_request(&self) -> bool {
        self.may_request_at(now_ms())
    }

    fn may_request_at(&self, now_ms: u64) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { since_ms } => {
                if now_ms.saturating_sub(since_ms) >= COOL_DOWN_MS {
                    inner.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => false,
        }
    }

    /// Record a successful attempt: any state collapses to `Closed` with the
    /// failure counter reset.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
    }

    /// Record a failed attempt.
    pub fn record_failure(&self) {
        self.record_failure_at(now_ms());
    }

    fn record_failure_at(&self, now_ms: u64) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= FAILURE_THRESHOLD {
                    inner.state = BreakerState::Open { since_ms: now_ms };
                    tracing::warn!(failures = inner.consecutive_failures, "circuit opened");
                }
            }
            BreakerState::HalfOpen => {
                inner.consecutive_failures += 1;
                inner.state = BreakerState::Open { since_ms: now_ms };
                tracing::warn!("probe failed, circuit re-opened");
            }
            BreakerState::Open { .. } => {
                inner.consecutive_failures += 1;
            }
        }
    }

    /// Non-mutating state snapshot (used by the router and `status()`; never
    /// triggers the half-open transition).
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Whether the breaker is open with an unexpired cool-down, read-only.
    pub fn is_open(&self) -> bool {
        self.is_open_at(now_ms())
    }

    fn is_open_at(&self, now_ms: u64) -> bool {
        match self.state() {
            BreakerState::Open { since_ms } => now_ms.saturating_sub(since_ms) < COOL_DOWN_MS,
            _ => false,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// Breaker registry keyed by provider; entries are created on first access so
/// every provider starts `Closed`.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<ProviderId, CircuitBreaker>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn may_request(&self, provider: ProviderId) -> bool {
        self.breakers
            .entry(provider)
            .or_default()
            .may_request()
    }

    pub fn record_success(&self, provider: ProviderId) {
        self.breakers.entry(provider).or_default().record_success();
    }

    pub fn record_failure(&self, provider: ProviderId) {
        self.breakers.entry(provider).or_default().record_failure();
    }

    pub fn state(&self, provider: ProviderId) -> BreakerState {
        self.breakers
            .get(&provider)
            .map(|b| b.state())
            .unwrap_or(BreakerState::Closed)
    }

    pub fn is_open(&self, provider: ProviderId) -> bool {
        self.breakers
            .get(&provider)
            .map(|b| b.is_open())
            .unwrap_or(false)
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(breaker: &CircuitBreaker, at_ms: u64) {
        for _ in 0..FAILURE_THRESHOLD {
            breaker.record_failure_at(at_ms);
        }
    }

    #[test]
    fn test_initial_state_closed_and_permissive() {
        let breaker = CircuitBreaker::new();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.may_request());
    }

    #[test]
    fn test_failures_below_threshold_stay_closed() {
        let breaker = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD - 1 {
            breaker.record_failure_at(1_000);
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.may_request_at(1_000));
    }

    #[test]
    fn test_threshold_trips_open_until_cool_down() {
        let breaker = CircuitBreaker::new();
        trip(&breaker, 1_000);

        assert_eq!(breaker.state(), BreakerState::Open { since_ms: 1_000 });
        assert!(!breaker.may_request_at(1_000));
        assert!(!breaker.may_request_at(1_000 + COOL_DOWN_MS - 1));
        assert!(breaker.may_request_at(1_000 + COOL_DOWN_MS));
    }

    #[test]
    fn test_half_open_admits_single_probe() {
        let breaker = CircuitBreaker::new();
        trip(&breaker, 1_000);

        let after = 1_000 + COOL_DOWN_MS;
        assert!(breaker.may_request_at(after));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        // Concurrent callers are rejected while the probe is in flight.
        assert!(!breaker.may_request_at(after));
        assert!(!breaker.may_request_at(after + 10));
    }

    #[test]
    fn test_probe_success_closes() {
        let breaker = CircuitBreaker::new();
        trip(&breaker, 1_000);
        assert!(breaker.may_request_at(1_000 + COOL_DOWN_MS));

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.may_request_at(1_000 + COOL_DOWN_MS + 1));
    }

    #[test]
    fn test_probe_failure_reopens() {
        let breaker = CircuitBreaker::new();
        trip(&breaker, 1_000);
        assert!(breaker.may_request_at(1_000 + COOL_DOWN_MS));

        let reopened_at = 1_000 + COOL_DOWN_MS + 5;
        breaker.record_failure_at(reopened_at);
        assert_eq!(
            breaker.state(),
            BreakerState::Open {
                since_ms: reopened_at
            }
        );
        assert!(!breaker.may_request_at(reopened_at + COOL_DOWN_MS - 1));
        assert!(breaker.may_request_at(reopened_at + COOL_DOWN_MS));
    }

    #[test]
    fn test_success_resets_from_any_state() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure_at(0);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);

        trip(&breaker, 0);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.may_request_at(0));
    }

    #[test]
    fn test_state_snapshot_does_not_transition() {
        let breaker = CircuitBreaker::new();
        trip(&breaker, 1_000);

        // Reading the state after cool-down must not consume the probe slot.
        let after = 1_000 + COOL_DOWN_MS;
        assert!(matches!(breaker.state(), BreakerState::Open { .. }));
        assert!(!breaker.is_open_at(after));
        assert!(breaker.may_request_at(after));
    }

    #[test]
    fn test_registry_starts_closed_per_provider() {
        let registry = BreakerRegistry::new();
        assert!(registry.may_request(ProviderId::Anthropic));
        assert_eq!(
            registry.state(ProviderId::OpenAiCompat),
            BreakerState::Closed
        );
        assert!(!registry.is_open(ProviderId::Ollama));

        registry.record_failure(ProviderId::Anthropic);
        assert_eq!(registry.state(ProviderId::OpenAiCompat), BreakerState::Closed);
    }
}
