//! Capability-aware provider selection
//!
//! The router turns a request intent into an ordered chain
//! `(primary, fallbacks…)`. Scoring is centralized here:
//!
//! ```text
//! score(p) = priority(p) × healthy_factor(p) × latency_factor(p) × (1 − error_rate(p))
//! ```
//!
//! Unhealthy providers are heavily penalized (×0.1) but never excluded, so a
//! recovering backend can still be probed. Breakers are consulted through
//! their read-only snapshot; the half-open probe slot is only ever consumed
//! by the executor's `may_request` gate.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::breaker::BreakerRegistry;
use crate::core::error::{RelayError, Result};
use crate::core::health::HealthTracker;
use crate::core::providers::ProviderId;
use crate::core::types::{Capability, ProviderConfig, RequestIntent};

/// Ordered provider chain for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub providers: Vec<ProviderId>,
    /// Every candidate was breaker-open; the executor may short-circuit to an
    /// offline response instead of probing.
    pub degraded: bool,
}

impl Chain {
    pub fn primary(&self) -> ProviderId {
        self.providers[0]
    }
}

/// Chain selection over the registered provider set.
#[derive(Debug)]
pub struct Router {
    registered: Vec<ProviderId>,
    configs: HashMap<ProviderId, ProviderConfig>,
    health: Arc<HealthTracker>,
    breakers: Arc<BreakerRegistry>,
}

impl Router {
    pub fn new(
        registered: Vec<ProviderId>,
        configs: HashMap<ProviderId, ProviderConfig>,
        health: Arc<HealthTracker>,
        breakers: Arc<BreakerRegistry>,
    ) -> Self {
        Self {
            registered,
            configs,
            health,
            breakers,
        }
    }

    fn config(&self, provider: ProviderId) -> ProviderConfig {
        self.configs
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::defaults_for(provider))
    }

    /// Select the chain for an intent.
    ///
    /// Fails only with `NoCapableProvider`; a chain whose members are all
    /// breaker-open is still returned, marked degraded.
    pub fn select(&self, intent: &RequestIntent) -> Result<Chain> {
        let capability = intent.capability;

        let capable: Vec<ProviderId> = self
            .registered
            .iter()
            .copied()
            .filter(|p| self.config(*p).supports(capability))
            .collect();
        if capable.is_empty() {
            return Err(RelayError::NoCapableProvider { capability });
        }

        let callable: Vec<ProviderId> = capable
            .iter()
            .copied()
            .filter(|p| !self.breakers.is_open(*p))
            .collect();
        let degraded = callable.is_empty();
        let candidates = if degraded { &capable } else { &callable };

        let primary = match intent.preferred_provider {
            Some(preferred) if capable.contains(&preferred) => preferred,
            Some(preferred) => {
                tracing::warn!(
                    provider = %preferred,
                    %capability,
                    "preferred provider cannot serve this capability, falling back to scoring"
                );
                self.best_of(candidates)
            }
            None => self.best_of(candidates),
        };

        let mut providers = vec![primary];
        for fallback in self.config(primary).fallbacks {
            if providers.contains(&fallback) {
                continue;
            }
            if !self.registered.contains(&fallback) {
                continue;
            }
            if !self.config(fallback).supports(capability) {
                continue;
            }
            if !degraded && self.breakers.is_open(fallback) {
                continue;
            }
            providers.push(fallback);
        }

        Ok(Chain {
            providers,
            degraded,
        })
    }

    fn best_of(&self, candidates: &[ProviderId]) -> ProviderId {
        let mut scored: Vec<(ProviderId, u8, f64)> = candidates
            .iter()
            .map(|&p| {
                let config = self.config(p);
                (p, config.priority, self.score(p, &config))
            })
            .collect();

        // Highest score wins; ties break on static priority, then on the
        // stable provider order.
        scored.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.cmp(&a.1))
                .then(a.0.cmp(&b.0))
        });

        scored[0].0
    }

    fn score(&self, provider: ProviderId, config: &ProviderConfig) -> f64 {
        let (healthy_factor, latency_factor, error_rate) = match self.health.snapshot(provider) {
            Some(stat) => {
                let healthy_factor = if stat.healthy { 1.0 } else { 0.1 };
                let latency_factor =
                    (1000.0 / stat.ewma_latency_ms.max(1) as f64).clamp(0.05, 10.0);
                (healthy_factor, latency_factor, stat.error_rate as f64)
            }
            // Untried providers score with neutral factors.
            None => (1.0, 1.0, 0.0),
        };

        config.priority as f64 * healthy_factor * latency_factor * (1.0 - error_rate)
    }
}
