//! Provider adapter: the per-backend HTTP contract
//!
//! One `ProviderAdapter` owns everything needed to talk to a single backend:
//! identity, base URL, credential, model identifier and a shared HTTP client
//! handle. Adapters are immutable after construction except for the model
//! identifier, which is hot-swappable. They never touch health or breaker
//! state; classifying and reporting outcomes is the executor's job, the
//! adapter only classifies at the HTTP boundary.

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::time::Duration;

use crate::core::error::{ErrorKind, RelayError, Result};
use crate::core::providers::descriptor::{AuthStyle, ProviderId, WireDialect};
use crate::core::providers::{anthropic, ollama, omen_router, openai_compat};
use crate::core::streaming::Framing;
use crate::core::types::{ChatResponse, Delta, RequestIntent};

/// Idle connections kept per backend host.
const POOL_MAX_IDLE_PER_HOST: usize = 10;
/// Idle connection lifetime.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const AZURE_DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Build the HTTP client shared by every adapter in one engine.
///
/// Request deadlines are enforced per attempt by the executor, so the client
/// itself carries only a connect timeout and the pool limits.
pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .build()
        .map_err(|e| RelayError::Config {
            provider: "relay",
            message: format!("failed to build HTTP client: {}", e),
        })
}

/// A fully encoded, dialect-specific HTTP request.
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

/// Per-backend translation between `RequestIntent` and provider wire formats.
#[derive(Debug)]
pub struct ProviderAdapter {
    id: ProviderId,
    base_url: String,
    api_key: Option<String>,
    model: RwLock<String>,
    http: reqwest::Client,
    /// Azure deployment name, embedded in the request path.
    deployment: Option<String>,
    /// Azure `api-version` query parameter.
    api_version: Option<String>,
}

impl ProviderAdapter {
    /// Create an adapter with explicit settings.
    pub fn new(
        id: ProviderId,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let base_url = base_url.into();
        validate_base_url(id, &base_url)?;

        Ok(Self {
            id,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: RwLock::new(model.into()),
            http,
            deployment: None,
            api_version: None,
        })
    }

    /// Attach Azure deployment routing (deployment name + api-version).
    pub fn with_azure_deployment(
        mut self,
        deployment: impl Into<String>,
        api_version: Option<String>,
    ) -> Self {
        self.deployment = Some(deployment.into());
        self.api_version =
            Some(api_version.unwrap_or_else(|| AZURE_DEFAULT_API_VERSION.to_string()));
        self
    }

    /// Build an adapter from the environment, or `None` when the provider is
    /// not configured (missing credential, or missing endpoint for backends
    /// without a global default).
    ///
    /// Environment is read once here, at engine init.
    pub fn from_env(id: ProviderId, http: reqwest::Client) -> Result<Option<Self>> {
        let descriptor = id.descriptor();

        let api_key = descriptor
            .key_env
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());

        let key_required = matches!(
            descriptor.auth,
            AuthStyle::Bearer | AuthStyle::XApiKey | AuthStyle::ApiKeyHeader
        );
        if key_required && api_key.is_none() {
            return Ok(None);
        }

        let base_url = match std::env::var(descriptor.endpoint_env) {
            Ok(endpoint) if !endpoint.is_empty() => endpoint,
            _ if descriptor.default_endpoint.is_empty() => return Ok(None),
            _ => descriptor.default_endpoint.to_string(),
        };

        let adapter = Self::new(id, base_url, api_key, default_model(id), http)?;

        if id == ProviderId::Azure {
            let deployment = match std::env::var("AZURE_OPENAI_DEPLOYMENT_NAME") {
                Ok(deployment) if !deployment.is_empty() => deployment,
                _ => {
                    tracing::warn!("azure endpoint configured without a deployment name, skipping");
                    return Ok(None);
                }
            };
            let api_version = std::env::var("AZURE_OPENAI_API_VERSION")
                .ok()
                .filter(|v| !v.is_empty());
            return Ok(Some(adapter.with_azure_deployment(deployment, api_version)));
        }

        Ok(Some(adapter))
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Static lowercase provider name, for logs and error messages.
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn model(&self) -> String {
        self.model.read().clone()
    }

    /// Swap the model identifier without rebuilding the adapter.
    pub fn set_model(&self, model: impl Into<String>) {
        *self.model.write() = model.into();
    }

    /// Stream framing used by this backend.
    pub fn framing(&self) -> Framing {
        match self.id.descriptor().dialect {
            WireDialect::Ollama => Framing::JsonLines,
            _ => Framing::Sse,
        }
    }

    /// Model to encode for this intent: the caller's hint, else the
    /// configured one.
    fn effective_model(&self, intent: &RequestIntent) -> String {
        intent
            .model_hint
            .clone()
            .unwrap_or_else(|| self.model())
    }

    // ==================== Encoding ====================

    /// Translate the intent into URL, headers and body bytes.
    pub fn encode(&self, intent: &RequestIntent) -> Result<EncodedRequest> {
        let model = self.effective_model(intent);
        let stream = intent.streaming && self.id.descriptor().streams_natively;

        let body = match self.id.descriptor().dialect {
            WireDialect::OpenAi => openai_compat::encode_body(intent, &model, stream),
            WireDialect::Anthropic => anthropic::encode_body(intent, &model, stream),
            WireDialect::Ollama => ollama::encode_body(intent, &model, stream),
            WireDialect::OmenRouter => omen_router::encode_body(intent, &model, stream),
        };

        Ok(EncodedRequest {
            url: self.build_url(intent)?,
            headers: self.build_headers(),
            body: serialize_body(self.name(), &body)?,
        })
    }

    fn build_url(&self, intent: &RequestIntent) -> Result<String> {
        let path = match self.id {
            ProviderId::OpenAiCompat | ProviderId::Xai => "/v1/chat/completions".to_string(),
            ProviderId::Anthropic => "/v1/messages".to_string(),
            ProviderId::OmenRouter => "/chat/completions".to_string(),
            ProviderId::Ollama => ollama::path_for(intent).to_string(),
            ProviderId::Azure => {
                let deployment = self.deployment.as_deref().ok_or(RelayError::Config {
                    provider: self.name(),
                    message: "missing Azure deployment name".to_string(),
                })?;
                let api_version = self
                    .api_version
                    .as_deref()
                    .unwrap_or(AZURE_DEFAULT_API_VERSION);
                format!(
                    "/openai/deployments/{}/chat/completions?api-version={}",
                    deployment, api_version
                )
            }
        };
        Ok(format!("{}{}", self.base_url, path))
    }

    fn build_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("content-type", "application/json".to_string())];

        match self.id.descriptor().auth {
            AuthStyle::Bearer | AuthStyle::BearerOptional => {
                if let Some(key) = &self.api_key {
                    headers.push(("authorization", format!("Bearer {}", key)));
                }
            }
            AuthStyle::XApiKey => {
                if let Some(key) = &self.api_key {
                    headers.push(("x-api-key", key.clone()));
                }
                headers.push(("anthropic-version", anthropic::API_VERSION.to_string()));
            }
            AuthStyle::ApiKeyHeader => {
                if let Some(key) = &self.api_key {
                    headers.push(("api-key", key.clone()));
                }
            }
            AuthStyle::None => {}
        }

        headers
    }

    // ==================== Decoding ====================

    /// Decode a complete non-streaming response body.
    pub fn decode(&self, body: &[u8]) -> Result<ChatResponse> {
        match self.id.descriptor().dialect {
            WireDialect::OpenAi => openai_compat::decode_response(self.name(), body),
            WireDialect::Anthropic => anthropic::decode_response(self.name(), body),
            WireDialect::Ollama => ollama::decode_response(self.name(), body),
            WireDialect::OmenRouter => omen_router::decode_response(self.name(), body),
        }
    }

    /// Decode one framed stream payload into a normalized delta.
    ///
    /// `Ok(None)` means the frame was a keep-alive or bookkeeping event; an
    /// error means the payload was malformed (the stream parser logs and
    /// drops it without failing the stream).
    pub fn decode_stream_event(&self, payload: &str) -> Result<Option<Delta>> {
        match self.id.descriptor().dialect {
            WireDialect::OpenAi => openai_compat::decode_stream_event(self.name(), payload),
            WireDialect::Anthropic => anthropic::decode_stream_event(self.name(), payload),
            WireDialect::Ollama => ollama::decode_stream_event(self.name(), payload),
            WireDialect::OmenRouter => omen_router::decode_stream_event(self.name(), payload),
        }
    }

    // ==================== HTTP ====================

    /// One non-streaming round trip.
    pub async fn send(&self, intent: &RequestIntent) -> Result<ChatResponse> {
        let response = self.dispatch(intent).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        self.decode(&body)
    }

    /// Open a streaming response; the caller drives the byte stream through
    /// the stream parser.
    pub async fn open_stream(&self, intent: &RequestIntent) -> Result<reqwest::Response> {
        self.dispatch(intent).await
    }

    async fn dispatch(&self, intent: &RequestIntent) -> Result<reqwest::Response> {
        let encoded = self.encode(intent)?;

        let mut headers = HeaderMap::new();
        for &(name, ref value) in &encoded.headers {
            let name = HeaderName::from_static(name);
            let value = HeaderValue::from_str(value).map_err(|_| RelayError::Config {
                provider: self.name(),
                message: format!("invalid header value for {}", name),
            })?;
            headers.insert(name, value);
        }

        let response = self
            .http
            .post(&encoded.url)
            .headers(headers)
            .body(encoded.body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(self.map_http_error(status.as_u16(), retry_after, &body))
    }

    /// Map a non-2xx status to the error taxonomy.
    fn map_http_error(&self, status: u16, retry_after: Option<u64>, body: &str) -> RelayError {
        let detail = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, truncate(body, 200))
        };

        match ErrorKind::from_status(status) {
            ErrorKind::RateLimit => RelayError::rate_limited(self.name(), detail, retry_after),
            kind => RelayError::provider(self.name(), kind, detail),
        }
    }

    fn map_transport_error(&self, error: reqwest::Error) -> RelayError {
        let kind = if error.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Network
        };
        RelayError::provider(self.name(), kind, error.to_string())
    }
}

fn serialize_body(provider: &'static str, body: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| RelayError::InvalidResponse {
        provider,
        message: format!("failed to serialize request body: {}", e),
    })
}

fn validate_base_url(id: ProviderId, base_url: &str) -> Result<()> {
    let parsed = url::Url::parse(base_url).map_err(|e| RelayError::Config {
        provider: id.name(),
        message: format!("malformed base URL '{}': {}", base_url, e),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(RelayError::Config {
            provider: id.name(),
            message: format!("unsupported URL scheme '{}'", scheme),
        }),
    }
}

/// Parse `Retry-After` as integer seconds.
///
/// HTTP also allows an absolute HTTP-date here; those values are deliberately
/// not parsed and fall back to the executor's 60 s default.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn default_model(id: ProviderId) -> &'static str {
    match id {
        ProviderId::OpenAiCompat => "gpt-4o",
        ProviderId::Anthropic => "claude-sonnet-4-20250514",
        ProviderId::Xai => "grok-2-latest",
        ProviderId::Azure => "gpt-4o",
        ProviderId::Ollama => "qwen2.5-coder",
        ProviderId::OmenRouter => "auto",
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Capability, ChatMessage};

    fn adapter(id: ProviderId, base_url: &str) -> ProviderAdapter {
        ProviderAdapter::new(
            id,
            base_url,
            Some("test-key".to_string()),
            default_model(id),
            reqwest::Client::new(),
        )
        .unwrap()
    }

    fn chat_intent() -> RequestIntent {
        RequestIntent::chat(vec![ChatMessage::user("ping")])
    }

    #[test]
    fn test_rejects_malformed_base_url() {
        let err = ProviderAdapter::new(
            ProviderId::OpenAiCompat,
            "not a url",
            None,
            "gpt-4o",
            reqwest::Client::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Config));

        let err = ProviderAdapter::new(
            ProviderId::OpenAiCompat,
            "ftp://example.com",
            None,
            "gpt-4o",
            reqwest::Client::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Config));
    }

    #[test]
    fn test_openai_encode_url_and_auth() {
        let encoded = adapter(ProviderId::OpenAiCompat, "https://api.openai.com")
            .encode(&chat_intent())
            .unwrap();

        assert_eq!(encoded.url, "https://api.openai.com/v1/chat/completions");
        assert!(
            encoded
                .headers
                .contains(&("authorization", "Bearer test-key".to_string()))
        );
    }

    #[test]
    fn test_anthropic_encode_headers() {
        let encoded = adapter(ProviderId::Anthropic, "https://api.anthropic.com")
            .encode(&chat_intent())
            .unwrap();

        assert_eq!(encoded.url, "https://api.anthropic.com/v1/messages");
        assert!(
            encoded
                .headers
                .contains(&("x-api-key", "test-key".to_string()))
        );
        assert!(
            encoded
                .headers
                .contains(&("anthropic-version", anthropic::API_VERSION.to_string()))
        );
        assert!(
            !encoded
                .headers
                .iter()
                .any(|(name, _)| *name == "authorization")
        );
    }

    #[test]
    fn test_azure_encode_deployment_path() {
        let adapter = adapter(ProviderId::Azure, "https://myres.openai.azure.com")
            .with_azure_deployment("gpt4o-prod", Some("2024-06-01".to_string()));
        let encoded = adapter.encode(&chat_intent()).unwrap();

        assert_eq!(
            encoded.url,
            "https://myres.openai.azure.com/openai/deployments/gpt4o-prod/chat/completions?api-version=2024-06-01"
        );
        assert!(
            encoded
                .headers
                .contains(&("api-key", "test-key".to_string()))
        );
    }

    #[test]
    fn test_azure_without_deployment_is_config_error() {
        let err = adapter(ProviderId::Azure, "https://myres.openai.azure.com")
            .encode(&chat_intent())
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Config));
    }

    #[test]
    fn test_ollama_needs_no_auth() {
        let adapter = ProviderAdapter::new(
            ProviderId::Ollama,
            "http://localhost:11434",
            None,
            "qwen2.5-coder",
            reqwest::Client::new(),
        )
        .unwrap();
        let encoded = adapter.encode(&chat_intent()).unwrap();

        assert_eq!(encoded.url, "http://localhost:11434/api/chat");
        assert_eq!(encoded.headers.len(), 1);
        assert_eq!(encoded.headers[0].0, "content-type");
    }

    #[test]
    fn test_ollama_generate_route_for_prompts() {
        let adapter = ProviderAdapter::new(
            ProviderId::Ollama,
            "http://localhost:11434",
            None,
            "qwen2.5-coder",
            reqwest::Client::new(),
        )
        .unwrap();
        let intent = RequestIntent::completion(Capability::CodeCompletion, "fn main(");
        let encoded = adapter.encode(&intent).unwrap();

        assert_eq!(encoded.url, "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_model_hint_overrides_configured_model() {
        let adapter = adapter(ProviderId::OpenAiCompat, "https://api.openai.com");
        let encoded = adapter
            .encode(&chat_intent().with_model_hint("gpt-4o-mini"))
            .unwrap();
        let body: Value = serde_json::from_slice(&encoded.body).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
    }

    #[test]
    fn test_model_hot_swap() {
        let adapter = adapter(ProviderId::OpenAiCompat, "https://api.openai.com");
        assert_eq!(adapter.model(), "gpt-4o");

        adapter.set_model("gpt-4.1");
        assert_eq!(adapter.model(), "gpt-4.1");

        let encoded = adapter.encode(&chat_intent()).unwrap();
        let body: Value = serde_json::from_slice(&encoded.body).unwrap();
        assert_eq!(body["model"], "gpt-4.1");
    }

    #[test]
    fn test_framing_per_dialect() {
        assert_eq!(
            adapter(ProviderId::OpenAiCompat, "https://api.openai.com").framing(),
            Framing::Sse
        );
        let ollama = ProviderAdapter::new(
            ProviderId::Ollama,
            "http://localhost:11434",
            None,
            "qwen2.5-coder",
            reqwest::Client::new(),
        )
        .unwrap();
        assert_eq!(ollama.framing(), Framing::JsonLines);
    }

    #[test]
    fn test_http_error_mapping() {
        let adapter = adapter(ProviderId::OpenAiCompat, "https://api.openai.com");

        assert_eq!(
            adapter.map_http_error(401, None, "").kind(),
            Some(ErrorKind::Auth)
        );
        assert_eq!(
            adapter.map_http_error(503, None, "overloaded").kind(),
            Some(ErrorKind::ProviderUnavailable)
        );
        assert_eq!(
            adapter.map_http_error(404, None, "").kind(),
            Some(ErrorKind::Config)
        );

        let err = adapter.map_http_error(429, Some(17), "slow down");
        assert_eq!(err.kind(), Some(ErrorKind::RateLimit));
        assert_eq!(err.retry_after(), Some(17));
    }

    #[test]
    fn test_retry_after_integer_seconds_only() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("42"));
        assert_eq!(parse_retry_after(&headers), Some(42));

        // HTTP-date form is not parsed; callers fall back to the default.
        headers.insert(
            "retry-after",
            HeaderValue::from_static("Fri, 01 Aug 2025 00:00:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }
}
