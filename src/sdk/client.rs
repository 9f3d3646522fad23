//! Embedded client facade
//!
//! `Relay` is the handle a host (CLI, editor plugin server) embeds. It
//! exposes the three upward operations — streaming `chat`, single-shot
//! `complete`, and `status` — over the shared engine. `RelayBuilder`
//! assembles the provider set either from explicit registrations or from the
//! environment, which is read once at build time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::error::Result;
use crate::core::executor::{Attempt, DeltaStream, RetryExecutor};
use crate::core::providers::{ProviderAdapter, ProviderId, build_http_client};
use crate::core::types::{
    Capability, ProviderConfig, ProviderHealthView, RequestIntent, RetryPolicy,
};

/// Shared engine handle.
#[derive(Clone)]
pub struct Relay {
    executor: Arc<RetryExecutor>,
}

impl Relay {
    pub fn builder() -> RelayBuilder {
        RelayBuilder::new()
    }

    /// Engine over every provider configured in the environment.
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env_providers().build()
    }

    /// Streaming chat completion.
    pub async fn chat(&self, intent: RequestIntent) -> Result<DeltaStream> {
        self.executor.execute_stream(intent).await
    }

    /// Single-shot code completion; still routed through the executor with
    /// full retry/fallback semantics.
    pub async fn complete(&self, prompt: &str, context: Option<&str>) -> Result<String> {
        let prompt = match context {
            Some(context) => format!("{}\n\n{}", context, prompt),
            None => prompt.to_string(),
        };
        let intent = RequestIntent::completion(Capability::CodeCompletion, prompt);
        self.executor.execute_text(intent).await
    }

    /// Execute an arbitrary intent and collect the text (analysis,
    /// explanation, refactor and test-generation requests).
    pub async fn run(&self, intent: RequestIntent) -> Result<String> {
        self.executor.execute_text(intent).await
    }

    /// Per-provider health and breaker view.
    pub fn status(&self) -> Vec<ProviderHealthView> {
        self.executor.status()
    }

    /// Recent attempt diagnostics, oldest first.
    pub fn recent_attempts(&self) -> Vec<Attempt> {
        self.executor.recent_attempts()
    }

    /// Registered providers, in stable order.
    pub fn providers(&self) -> Vec<ProviderId> {
        self.executor.providers()
    }

    /// Hot-swap the model used by one provider. Returns false when the
    /// provider is not registered.
    pub fn set_model(&self, provider: ProviderId, model: impl Into<String>) -> bool {
        match self.executor.adapter(provider) {
            Some(adapter) => {
                adapter.set_model(model);
                true
            }
            None => false,
        }
    }
}

struct ProviderSpec {
    id: ProviderId,
    base_url: String,
    api_key: Option<String>,
    model: String,
    azure_deployment: Option<(String, Option<String>)>,
}

/// Builder for [`Relay`].
pub struct RelayBuilder {
    specs: Vec<ProviderSpec>,
    configs: HashMap<ProviderId, ProviderConfig>,
    policy: RetryPolicy,
    read_env: bool,
}

impl RelayBuilder {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            configs: HashMap::new(),
            policy: RetryPolicy::default(),
            read_env: false,
        }
    }

    /// Also register every provider resolvable from `*_API_KEY` /
    /// `*_ENDPOINT` variables (explicit registrations win).
    pub fn with_env_providers(mut self) -> Self {
        self.read_env = true;
        self
    }

    /// Register a provider explicitly.
    pub fn with_provider(
        mut self,
        id: ProviderId,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        self.specs.push(ProviderSpec {
            id,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            azure_deployment: None,
        });
        self
    }

    /// Register an Azure deployment explicitly.
    pub fn with_azure_provider(
        mut self,
        base_url: impl Into<String>,
        api_key: Option<String>,
        deployment: impl Into<String>,
        api_version: Option<String>,
    ) -> Self {
        self.specs.push(ProviderSpec {
            id: ProviderId::Azure,
            base_url: base_url.into(),
            api_key,
            model: String::new(),
            azure_deployment: Some((deployment.into(), api_version)),
        });
        self
    }

    /// Override the policy record for one provider.
    pub fn with_config(mut self, provider: ProviderId, config: ProviderConfig) -> Self {
        self.configs.insert(provider, config);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Result<Relay> {
        let http = build_http_client()?;
        let mut adapters: HashMap<ProviderId, Arc<ProviderAdapter>> = HashMap::new();

        for spec in self.specs {
            let adapter = ProviderAdapter::new(
                spec.id,
                spec.base_url,
                spec.api_key,
                spec.model,
                http.clone(),
            )?;
            let adapter = match spec.azure_deployment {
                Some((deployment, api_version)) => {
                    adapter.with_azure_deployment(deployment, api_version)
                }
                None => adapter,
            };
            adapters.insert(spec.id, Arc::new(adapter));
        }

        if self.read_env {
            for id in ProviderId::ALL {
                if adapters.contains_key(&id) {
                    continue;
                }
                if let Some(adapter) = ProviderAdapter::from_env(id, http.clone())? {
                    tracing::info!(provider = %id, "registered from environment");
                    adapters.insert(id, Arc::new(adapter));
                }
            }
        }

        if adapters.is_empty() {
            tracing::warn!("no providers configured; every request will fail routing");
        }

        let mut configs = self.configs;
        for &id in adapters.keys() {
            configs
                .entry(id)
                .or_insert_with(|| ProviderConfig::defaults_for(id));
        }

        Ok(Relay {
            executor: Arc::new(RetryExecutor::new(adapters, configs, self.policy)),
        })
    }
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
