//! Provider adapters using the enum-based dispatch design
//!
//! `ProviderId` is the fixed backend enumeration; `ProviderAdapter` owns one
//! backend's HTTP contract. Dialect modules hold the pure encode/decode
//! functions so they stay unit-testable without any HTTP:
//!
//! - `openai_compat` — the shared `/v1/chat/completions` family (also used by
//!   xAI and Azure deployments)
//! - `anthropic` — the messages API (shares nothing with the OpenAI family)
//! - `ollama` — the local daemon's JSON-lines contract
//! - `omen_router` — OpenAI-compatible body plus routing-hint tags

pub mod adapter;
pub mod anthropic;
pub mod descriptor;
pub mod ollama;
pub mod omen_router;
pub mod openai_compat;

pub use adapter::{EncodedRequest, ProviderAdapter, build_http_client};
pub use descriptor::{AuthStyle, ProviderDescriptor, ProviderId, WireDialect};
