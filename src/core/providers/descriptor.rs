//! Provider identities and their static wire descriptors
//!
//! The provider set is a fixed enumeration; each value carries a compile-time
//! descriptor naming its wire dialect, auth-header style, default endpoint,
//! native-streaming flag, capability matrix and environment variable names.
//! Nothing here is discovered at runtime.

use serde::{Deserialize, Serialize};

use crate::core::types::Capability;

/// Identity tag for a remote backend.
///
/// Declaration order doubles as the deterministic routing tie-break: on equal
/// score and priority, the lower variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    OpenAiCompat,
    Anthropic,
    Xai,
    Azure,
    Ollama,
    OmenRouter,
}

/// Request/response encoding family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireDialect {
    /// `/v1/chat/completions` with `choices[].delta` streaming.
    OpenAi,
    /// `/v1/messages` with typed content blocks and `stop_reason` termination.
    Anthropic,
    /// `/api/chat` with newline-delimited JSON streaming.
    Ollama,
    /// OpenAI-compatible body plus routing-hint tags and explicit `final`
    /// markers in stream events.
    OmenRouter,
}

/// How credentials are attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// `Authorization: Bearer <key>`, but the key may be absent.
    BearerOptional,
    /// Azure's `api-key: <key>` header.
    ApiKeyHeader,
    /// Anthropic's `x-api-key: <key>` plus `anthropic-version`.
    XApiKey,
    /// No credentials (local daemon).
    None,
}

/// Static description of one provider backend.
#[derive(Debug)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    /// Stable lowercase name used in logs and error messages.
    pub name: &'static str,
    pub dialect: WireDialect,
    pub auth: AuthStyle,
    /// Base URL used when no endpoint override is configured. Empty means the
    /// endpoint must be supplied (Azure resources have no global default).
    pub default_endpoint: &'static str,
    pub streams_natively: bool,
    pub capabilities: &'static [Capability],
    /// Environment variable holding the API key, when the provider takes one.
    pub key_env: Option<&'static str>,
    /// Environment variable overriding the endpoint.
    pub endpoint_env: &'static str,
}

use Capability::*;

static OPENAI_COMPAT: ProviderDescriptor = ProviderDescriptor {
    id: ProviderId::OpenAiCompat,
    name: "openai_compat",
    dialect: WireDialect::OpenAi,
    auth: AuthStyle::Bearer,
    default_endpoint: "https://api.openai.com",
    streams_natively: true,
    capabilities: &[
        ChatCompletion,
        CodeCompletion,
        CodeAnalysis,
        CodeExplanation,
        Refactor,
        TestGen,
        Streaming,
    ],
    key_env: Some("OPENAI_API_KEY"),
    endpoint_env: "OPENAI_ENDPOINT",
};

static ANTHROPIC: ProviderDescriptor = ProviderDescriptor {
    id: ProviderId::Anthropic,
    name: "anthropic",
    dialect: WireDialect::Anthropic,
    auth: AuthStyle::XApiKey,
    default_endpoint: "https://api.anthropic.com",
    streams_natively: true,
    capabilities: &[
        ChatCompletion,
        CodeAnalysis,
        CodeExplanation,
        Refactor,
        TestGen,
        Streaming,
    ],
    key_env: Some("ANTHROPIC_API_KEY"),
    endpoint_env: "ANTHROPIC_ENDPOINT",
};

static XAI: ProviderDescriptor = ProviderDescriptor {
    id: ProviderId::Xai,
    name: "xai",
    dialect: WireDialect::OpenAi,
    auth: AuthStyle::Bearer,
    default_endpoint: "https://api.x.ai",
    streams_natively: true,
    capabilities: &[ChatCompletion, CodeCompletion, CodeExplanation, Streaming],
    key_env: Some("XAI_API_KEY"),
    endpoint_env: "XAI_ENDPOINT",
};

static AZURE: ProviderDescriptor = ProviderDescriptor {
    id: ProviderId::Azure,
    name: "azure",
    dialect: WireDialect::OpenAi,
    auth: AuthStyle::ApiKeyHeader,
    default_endpoint: "",
    streams_natively: true,
    capabilities: &[
        ChatCompletion,
        CodeCompletion,
        CodeAnalysis,
        TestGen,
        Streaming,
    ],
    key_env: Some("AZURE_OPENAI_API_KEY"),
    endpoint_env: "AZURE_OPENAI_ENDPOINT",
};

static OLLAMA: ProviderDescriptor = ProviderDescriptor {
    id: ProviderId::Ollama,
    name: "ollama",
    dialect: WireDialect::Ollama,
    auth: AuthStyle::None,
    default_endpoint: "http://localhost:11434",
    streams_natively: true,
    capabilities: &[ChatCompletion, CodeCompletion, CodeAnalysis, Streaming],
    key_env: None,
    endpoint_env: "OLLAMA_ENDPOINT",
};

static OMEN_ROUTER: ProviderDescriptor = ProviderDescriptor {
    id: ProviderId::OmenRouter,
    name: "omen_router",
    dialect: WireDialect::OmenRouter,
    auth: AuthStyle::BearerOptional,
    default_endpoint: "https://api.omenrouter.dev",
    streams_natively: true,
    capabilities: &[
        ChatCompletion,
        CodeCompletion,
        CodeAnalysis,
        CodeExplanation,
        Refactor,
        TestGen,
        Streaming,
    ],
    key_env: Some("OMEN_ROUTER_API_KEY"),
    endpoint_env: "OMEN_ROUTER_ENDPOINT",
};

impl ProviderId {
    /// All providers, in tie-break order.
    pub const ALL: [ProviderId; 6] = [
        ProviderId::OpenAiCompat,
        ProviderId::Anthropic,
        ProviderId::Xai,
        ProviderId::Azure,
        ProviderId::Ollama,
        ProviderId::OmenRouter,
    ];

    /// The static wire descriptor for this provider.
    pub fn descriptor(self) -> &'static ProviderDescriptor {
        match self {
            ProviderId::OpenAiCompat => &OPENAI_COMPAT,
            ProviderId::Anthropic => &ANTHROPIC,
            ProviderId::Xai => &XAI,
            ProviderId::Azure => &AZURE,
            ProviderId::Ollama => &OLLAMA,
            ProviderId::OmenRouter => &OMEN_ROUTER,
        }
    }

    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Whether the static capability matrix contains `capability`.
    pub fn supports(self, capability: Capability) -> bool {
        self.descriptor().capabilities.contains(&capability)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_ids_match() {
        for provider in ProviderId::ALL {
            assert_eq!(provider.descriptor().id, provider);
        }
    }

    #[test]
    fn test_every_provider_streams_and_chats() {
        for provider in ProviderId::ALL {
            assert!(provider.supports(Capability::ChatCompletion), "{provider}");
            assert!(provider.supports(Capability::Streaming), "{provider}");
        }
    }

    #[test]
    fn test_keyless_providers() {
        assert!(ProviderId::Ollama.descriptor().key_env.is_none());
        assert_eq!(ProviderId::Ollama.descriptor().auth, AuthStyle::None);
        assert_eq!(
            ProviderId::OmenRouter.descriptor().auth,
            AuthStyle::BearerOptional
        );
    }

    #[test]
    fn test_tie_break_order_is_declaration_order() {
        assert!(ProviderId::OpenAiCompat < ProviderId::Anthropic);
        assert!(ProviderId::Anthropic < ProviderId::OmenRouter);
    }

    #[test]
    fn test_azure_requires_explicit_endpoint() {
        assert!(ProviderId::Azure.descriptor().default_endpoint.is_empty());
    }
}
