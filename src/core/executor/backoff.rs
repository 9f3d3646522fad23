//! Backoff computation
//!
//! Exponential backoff with a hard ceiling and ±25 % uniform jitter, with
//! per-kind overrides: timeouts start from a doubled base, unavailable
//! providers wait a flat multiple of the base (5 s at defaults), and rate
//! limits honor the server's `Retry-After` with a floor at the configured
//! default so a `Retry-After: 0` cannot hot-spin.

use rand::Rng;
use std::time::Duration;

use crate::core::error::ErrorKind;
use crate::core::types::RetryPolicy;

const JITTER: f64 = 0.25;

/// Flat multiplier of the base delay used for unavailable providers.
const UNAVAILABLE_BASE_MULTIPLIER: u64 = 5;

/// Delay before retrying attempt `attempt` (0-based) that failed with `kind`.
///
/// Non-retryable kinds sleep zero; the executor breaks out instead of
/// sleeping for them.
pub fn delay_for(
    policy: &RetryPolicy,
    kind: ErrorKind,
    attempt: u32,
    retry_after_secs: Option<u64>,
) -> Duration {
    if !kind.is_retryable() {
        return Duration::ZERO;
    }

    let millis = match kind {
        ErrorKind::RateLimit => {
            // Server-directed: no jitter, and zero collapses to the floor.
            return Duration::from_millis(match retry_after_secs {
                Some(secs) if secs > 0 => secs * 1_000,
                _ => policy.rate_limit_default_ms,
            });
        }
        ErrorKind::ProviderUnavailable => {
            (UNAVAILABLE_BASE_MULTIPLIER * policy.base_delay_ms).min(policy.max_delay_ms)
        }
        ErrorKind::Timeout => exponential(2 * policy.base_delay_ms, attempt, policy.max_delay_ms),
        _ => exponential(policy.base_delay_ms, attempt, policy.max_delay_ms),
    };

    Duration::from_millis(with_jitter(millis))
}

fn exponential(base_ms: u64, attempt: u32, max_ms: u64) -> u64 {
    let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor).min(max_ms)
}

fn with_jitter(millis: u64) -> u64 {
    let factor = rand::thread_rng().gen_range(1.0 - JITTER..=1.0 + JITTER);
    (millis as f64 * factor) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[test]
    fn test_network_backoff_within_jitter_envelope() {
        let policy = policy();
        for attempt in 0..4 {
            let expected = (policy.base_delay_ms * (1 << attempt)).min(policy.max_delay_ms);
            let lower = (expected as f64 * 0.75) as u128;
            let upper = (expected as f64 * 1.25) as u128;

            for _ in 0..32 {
                let delay = delay_for(&policy, ErrorKind::Network, attempt, None).as_millis();
                assert!(
                    delay >= lower && delay <= upper,
                    "attempt {}: {} outside [{}, {}]",
                    attempt,
                    delay,
                    lower,
                    upper
                );
            }
        }
    }

    #[test]
    fn test_exponential_caps_at_max() {
        let policy = policy();
        // 2^10 seconds would be far past the ceiling.
        let delay = delay_for(&policy, ErrorKind::Network, 10, None).as_millis() as u64;
        assert!(delay <= (policy.max_delay_ms as f64 * 1.25) as u64);
    }

    #[test]
    fn test_timeout_uses_doubled_base() {
        let policy = policy();
        let delay = delay_for(&policy, ErrorKind::Timeout, 0, None).as_millis() as u64;
        let expected = 2 * policy.base_delay_ms;
        assert!(delay >= (expected as f64 * 0.75) as u64);
        assert!(delay <= (expected as f64 * 1.25) as u64);
    }

    #[test]
    fn test_unavailable_is_flat_multiple_of_base() {
        let policy = policy();
        for attempt in 0..3 {
            let delay =
                delay_for(&policy, ErrorKind::ProviderUnavailable, attempt, None).as_millis() as u64;
            assert!(delay >= (5_000.0 * 0.75) as u64);
            assert!(delay <= (5_000.0 * 1.25) as u64);
        }
    }

    #[test]
    fn test_rate_limit_honors_retry_after() {
        let policy = policy();
        assert_eq!(
            delay_for(&policy, ErrorKind::RateLimit, 0, Some(17)),
            Duration::from_secs(17)
        );
    }

    #[test]
    fn test_rate_limit_zero_collapses_to_floor() {
        let policy = policy();
        assert_eq!(
            delay_for(&policy, ErrorKind::RateLimit, 0, Some(0)),
            Duration::from_millis(policy.rate_limit_default_ms)
        );
        assert_eq!(
            delay_for(&policy, ErrorKind::RateLimit, 2, None),
            Duration::from_millis(policy.rate_limit_default_ms)
        );
    }

    #[test]
    fn test_non_retryable_kinds_sleep_zero() {
        let policy = policy();
        for kind in [
            ErrorKind::Auth,
            ErrorKind::InvalidResponse,
            ErrorKind::Config,
            ErrorKind::Unknown,
        ] {
            assert_eq!(delay_for(&policy, kind, 1, None), Duration::ZERO);
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = policy();
        let delay = delay_for(&policy, ErrorKind::Network, u32::MAX, None);
        assert!(delay.as_millis() as u64 <= (policy.max_delay_ms as f64 * 1.25) as u64);
    }
}
