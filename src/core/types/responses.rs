//! Response-side data model
//!
//! `Delta` is the normalized streaming event every dialect is decoded into; a
//! stream is a finite sequence of deltas whose last element has `final=true`.
//! `ChatResponse` is the non-streaming counterpart.

use serde::{Deserialize, Serialize};

use crate::core::error::ErrorKind;
use crate::core::providers::ProviderId;

/// Token usage as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A complete, non-streamed chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Concatenated assistant text.
    pub content: String,
    /// Model identifier echoed by the provider.
    pub model: String,
    pub usage: Option<Usage>,
}

/// One normalized incremental event in a streamed response.
///
/// Exactly one delta per stream carries `is_final = true`, and it is the last
/// element. Error-terminated streams mark the final delta with the failure
/// kind and put a short message in `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub content: String,
    #[serde(rename = "final")]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,
    /// Emission timestamp, unix milliseconds.
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl Delta {
    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Intermediate content delta.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_final: false,
            token_count: None,
            ts: Self::now_ms(),
            error: None,
        }
    }

    /// Successful terminal delta (empty content by convention).
    pub fn finished() -> Self {
        Self {
            content: String::new(),
            is_final: true,
            token_count: None,
            ts: Self::now_ms(),
            error: None,
        }
    }

    /// Terminal delta carrying final content, e.g. from dialects whose last
    /// event still holds text.
    pub fn final_text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_final: true,
            token_count: None,
            ts: Self::now_ms(),
            error: None,
        }
    }

    /// Error-marked terminal delta.
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_final: true,
            token_count: None,
            ts: Self::now_ms(),
            error: Some(kind),
        }
    }

    pub fn with_token_count(mut self, count: u32) -> Self {
        self.token_count = Some(count);
        self
    }
}

/// Circuit breaker state as exposed through `status()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStateView {
    Closed,
    Open,
    HalfOpen,
}

/// Per-provider health row returned by `status()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealthView {
    pub provider: ProviderId,
    pub healthy: bool,
    /// Most recent success or failure, unix seconds.
    pub last_check_ts: Option<u64>,
    pub ewma_latency_ms: u64,
    pub error_rate: f32,
    pub breaker_state: BreakerStateView,
    pub total_requests: u64,
    pub successful_requests: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_totals() {
        let usage = Usage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_delta_constructors() {
        let d = Delta::text("pong");
        assert!(!d.is_final);
        assert!(d.error.is_none());

        let d = Delta::finished();
        assert!(d.is_final);
        assert!(d.content.is_empty());

        let d = Delta::failed(ErrorKind::ProviderUnavailable, "all backends down");
        assert!(d.is_final);
        assert_eq!(d.error, Some(ErrorKind::ProviderUnavailable));
    }

    #[test]
    fn test_delta_serializes_final_field_name() {
        let json = serde_json::to_value(Delta::finished()).unwrap();
        assert_eq!(json.get("final"), Some(&serde_json::Value::Bool(true)));
    }
}
