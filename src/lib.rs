//! # llm-relay
//!
//! Provider routing and resilience engine for local developer agents: a
//! single typed interface over heterogeneous LLM backends that picks the best
//! provider per task, degrades gracefully when backends fail, and streams
//! incremental tokens back to the host.
//!
//! ## Features
//!
//! - **Multi-provider**: OpenAI-compatible servers, Anthropic, xAI, Azure
//!   OpenAI deployments, local Ollama, and OmenRouter behind one adapter
//!   contract
//! - **Capability-weighted routing**: per-request chains scored on priority,
//!   health, latency and error rate, with static fallback lists
//! - **Failure isolation**: per-provider three-state circuit breakers with a
//!   single-probe half-open phase
//! - **Bounded retries**: per-attempt timeouts, exponential backoff with
//!   jitter, `Retry-After`-aware rate-limit handling
//! - **Streaming**: SSE and JSON-lines parsing through a growable ring
//!   buffer, normalized to one delta contract
//! - **Racing**: optional parallel first-token race across the top providers
//!   with prompt loser teardown
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use llm_relay::{ChatMessage, Relay, RequestIntent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Providers are picked up from *_API_KEY / *_ENDPOINT variables.
//!     let relay = Relay::from_env()?;
//!
//!     let mut stream = relay
//!         .chat(RequestIntent::chat(vec![ChatMessage::user(
//!             "Explain this borrow checker error",
//!         )]))
//!         .await?;
//!
//!     while let Some(delta) = stream.next().await {
//!         print!("{}", delta.content);
//!         if delta.is_final {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod core;
pub mod sdk;

// Re-export the main types at the crate root.
pub use crate::core::breaker::{BreakerState, CircuitBreaker};
pub use crate::core::error::{ErrorKind, RelayError, Result};
pub use crate::core::executor::{
    Attempt, AttemptOutcome, DeltaStream, OFFLINE_MESSAGE, RetryExecutor,
};
pub use crate::core::health::{HealthStat, HealthTracker};
pub use crate::core::providers::{ProviderAdapter, ProviderId};
pub use crate::core::router::{Chain, Router};
pub use crate::core::streaming::{DeltaAssembler, Framing, StreamParser};
pub use crate::core::types::{
    BreakerStateView, Capability, ChatMessage, ChatResponse, Delta, MessageRole, ProviderConfig,
    ProviderHealthView, RequestIntent, RetryPolicy, Usage,
};
pub use crate::sdk::{Relay, RelayBuilder};
