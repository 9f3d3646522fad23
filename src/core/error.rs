//! Unified error handling for the routing engine
//!
//! Single error type for all providers plus the closed `ErrorKind` taxonomy
//! that drives retry and backoff decisions.
//!
//! ## Core Components
//!
//! ### `ErrorKind`
//! A closed, copyable classification attached to every provider failure.
//!
//! | Kind | Retryable | Source signals |
//! |------|-----------|----------------|
//! | Network | yes | connect refused, DNS failure, connection reset |
//! | Timeout | yes | per-attempt timer expired |
//! | Auth | no | 401/403, missing or invalid key |
//! | RateLimit | yes | 429 |
//! | ProviderUnavailable | yes | 5xx, circuit open |
//! | InvalidResponse | no | non-auth 4xx, JSON parse error |
//! | Config | no | unknown model, missing deployment, malformed URL |
//! | Unknown | no | anything else |
//!
//! ### `RelayError`
//! The public error enum. Provider-scoped variants mirror the kinds above and
//! carry the static provider name with an owned message; engine-scoped
//! variants cover routing and stream-buffer failures.

use serde::{Deserialize, Serialize};

use crate::core::types::Capability;

/// Failure classification for one provider attempt.
///
/// This set is closed: the executor's retry table and the streaming error
/// markers are both exhaustive over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    Auth,
    RateLimit,
    ProviderUnavailable,
    InvalidResponse,
    Config,
    Unknown,
}

impl ErrorKind {
    /// Whether the executor may retry an attempt that failed with this kind.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network
                | ErrorKind::Timeout
                | ErrorKind::RateLimit
                | ErrorKind::ProviderUnavailable
        )
    }

    /// Classify an HTTP status code.
    ///
    /// 401/403 are authentication failures, 429 is rate limiting, 404 maps to
    /// `Config` (unknown model or missing deployment), remaining 4xx are
    /// invalid requests/responses, and 5xx means the provider is unavailable.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Auth,
            429 => ErrorKind::RateLimit,
            404 => ErrorKind::Config,
            400..=499 => ErrorKind::InvalidResponse,
            500..=599 => ErrorKind::ProviderUnavailable,
            _ => ErrorKind::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::Config => "config",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Unified error type for the engine and all provider adapters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RelayError {
    #[error("Network error for {provider}: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    #[error("Timeout for {provider}: {message}")]
    Timeout {
        provider: &'static str,
        message: String,
    },

    #[error("Authentication failed for {provider}: {message}")]
    Auth {
        provider: &'static str,
        message: String,
    },

    #[error("Rate limit exceeded for {provider}: {message}")]
    RateLimit {
        provider: &'static str,
        message: String,
        /// Server-supplied cool-off in whole seconds, when present.
        retry_after: Option<u64>,
    },

    #[error("Provider {provider} is unavailable: {message}")]
    ProviderUnavailable {
        provider: &'static str,
        message: String,
    },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    #[error("Configuration error for {provider}: {message}")]
    Config {
        provider: &'static str,
        message: String,
    },

    #[error("Unexpected error for {provider}: {message}")]
    Unknown {
        provider: &'static str,
        message: String,
    },

    #[error("No capable provider for {capability}")]
    NoCapableProvider { capability: Capability },

    #[error("All providers failed for {capability} (last: {last_kind})")]
    AllProvidersFailed {
        capability: Capability,
        last_kind: ErrorKind,
    },

    #[error("Stream buffer overflow: event would exceed the {limit}-byte ceiling")]
    BufferOverflow { limit: usize },
}

impl RelayError {
    /// Construct a provider-scoped error from a kind.
    pub fn provider(provider: &'static str, kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Network => RelayError::Network { provider, message },
            ErrorKind::Timeout => RelayError::Timeout { provider, message },
            ErrorKind::Auth => RelayError::Auth { provider, message },
            ErrorKind::RateLimit => RelayError::RateLimit {
                provider,
                message,
                retry_after: None,
            },
            ErrorKind::ProviderUnavailable => RelayError::ProviderUnavailable { provider, message },
            ErrorKind::InvalidResponse => RelayError::InvalidResponse { provider, message },
            ErrorKind::Config => RelayError::Config { provider, message },
            ErrorKind::Unknown => RelayError::Unknown { provider, message },
        }
    }

    /// Rate-limit error carrying the server's `Retry-After` value.
    pub fn rate_limited(
        provider: &'static str,
        message: impl Into<String>,
        retry_after: Option<u64>,
    ) -> Self {
        RelayError::RateLimit {
            provider,
            message: message.into(),
            retry_after,
        }
    }

    /// The failure classification, when this is a provider-scoped error.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            RelayError::Network { .. } => Some(ErrorKind::Network),
            RelayError::Timeout { .. } => Some(ErrorKind::Timeout),
            RelayError::Auth { .. } => Some(ErrorKind::Auth),
            RelayError::RateLimit { .. } => Some(ErrorKind::RateLimit),
            RelayError::ProviderUnavailable { .. } => Some(ErrorKind::ProviderUnavailable),
            RelayError::InvalidResponse { .. } => Some(ErrorKind::InvalidResponse),
            RelayError::Config { .. } => Some(ErrorKind::Config),
            RelayError::Unknown { .. } => Some(ErrorKind::Unknown),
            RelayError::NoCapableProvider { .. }
            | RelayError::AllProvidersFailed { .. }
            | RelayError::BufferOverflow { .. } => None,
        }
    }

    /// Whether the executor may retry after this error.
    pub fn is_retryable(&self) -> bool {
        self.kind().map(ErrorKind::is_retryable).unwrap_or(false)
    }

    /// Server-requested retry delay in seconds, when present.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            RelayError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, RelayError>;
