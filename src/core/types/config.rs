//! Per-provider policy records and executor retry policy
//!
//! `ProviderConfig` is the host-overridable policy attached to each provider:
//! routing priority, capability set, advisory rate limit, per-attempt timeout
//! and the static fallback chain. The crate ships a usable default table so
//! the engine works with zero configuration.

use crate::core::providers::ProviderId;
use crate::core::types::Capability;

/// Per-provider routing and resilience policy.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Routing priority in `[1, 10]`; higher is preferred.
    pub priority: u8,
    /// Capabilities this provider is allowed to serve.
    pub capabilities: Vec<Capability>,
    /// Advisory requests-per-minute ceiling, enforced by the executor.
    /// `0` disables the gate.
    pub max_rpm: u32,
    /// Hard per-attempt ceiling in milliseconds.
    pub timeout_ms: u32,
    /// Ordered fallback providers tried after this one is exhausted.
    pub fallbacks: Vec<ProviderId>,
}

impl ProviderConfig {
    /// Built-in policy for a provider.
    ///
    /// Priorities favor the strongest remote chat models, with the local
    /// Ollama daemon as the low-priority safety net; timeouts are generous
    /// for local inference and tight for hosted APIs.
    pub fn defaults_for(provider: ProviderId) -> Self {
        let caps = provider.descriptor().capabilities.to_vec();
        match provider {
            ProviderId::Anthropic => Self {
                priority: 9,
                capabilities: caps,
                max_rpm: 60,
                timeout_ms: 60_000,
                fallbacks: vec![ProviderId::OpenAiCompat, ProviderId::OmenRouter],
            },
            ProviderId::OpenAiCompat => Self {
                priority: 8,
                capabilities: caps,
                max_rpm: 60,
                timeout_ms: 30_000,
                fallbacks: vec![ProviderId::Anthropic, ProviderId::Ollama],
            },
            ProviderId::OmenRouter => Self {
                priority: 7,
                capabilities: caps,
                max_rpm: 120,
                timeout_ms: 30_000,
                fallbacks: vec![ProviderId::OpenAiCompat, ProviderId::Anthropic],
            },
            ProviderId::Azure => Self {
                priority: 6,
                capabilities: caps,
                max_rpm: 120,
                timeout_ms: 30_000,
                fallbacks: vec![ProviderId::OpenAiCompat],
            },
            ProviderId::Xai => Self {
                priority: 5,
                capabilities: caps,
                max_rpm: 60,
                timeout_ms: 30_000,
                fallbacks: vec![ProviderId::OpenAiCompat],
            },
            ProviderId::Ollama => Self {
                priority: 3,
                capabilities: caps,
                max_rpm: 0,
                timeout_ms: 120_000,
                fallbacks: vec![ProviderId::OmenRouter],
            },
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Retry and backoff policy applied by the executor.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries per provider beyond the initial attempt.
    pub max_retries: u32,
    /// Exponential backoff base.
    pub base_delay_ms: u64,
    /// Backoff ceiling.
    pub max_delay_ms: u64,
    /// Sleep applied when a rate-limited provider supplies no `Retry-After`.
    pub rate_limit_default_ms: u64,
    /// Number of providers raced when `intent.race` is set.
    pub race_width: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            rate_limit_default_ms: 60_000,
            race_width: 2,
        }
    }
}
