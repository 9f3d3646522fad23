//! Advisory per-provider request-rate gate
//!
//! Sliding one-minute window of attempt timestamps. The limit is advisory
//! (`max_rpm` in the provider policy): an over-limit provider is skipped in
//! the chain rather than slept on, so a single busy backend never stalls the
//! request.

use dashmap::DashMap;
use std::collections::VecDeque;

use crate::core::breaker::now_ms;
use crate::core::providers::ProviderId;

const WINDOW_MS: u64 = 60_000;

#[derive(Debug, Default)]
pub struct RpmGate {
    windows: DashMap<ProviderId, VecDeque<u64>>,
}

impl RpmGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one attempt now, recording it when admitted. `max_rpm == 0`
    /// disables the gate.
    pub fn admit(&self, provider: ProviderId, max_rpm: u32) -> bool {
        self.admit_at(provider, max_rpm, now_ms())
    }

    fn admit_at(&self, provider: ProviderId, max_rpm: u32, now_ms: u64) -> bool {
        if max_rpm == 0 {
            return true;
        }

        let mut window = self.windows.entry(provider).or_default();
        while let Some(&oldest) = window.front() {
            if now_ms.saturating_sub(oldest) >= WINDOW_MS {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= max_rpm as usize {
            return false;
        }
        window.push_back(now_ms);
        true
    }
}
