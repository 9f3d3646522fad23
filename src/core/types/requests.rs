//! Request-side data model
//!
//! `RequestIntent` is the provider-independent description of one logical
//! request. It is immutable once the executor accepts it; adapters translate
//! it into dialect-specific HTTP requests.

use serde::{Deserialize, Serialize};

use crate::core::providers::ProviderId;
use crate::core::types::Capability;

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One conversation message. Order within a request is semantically
/// significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Caller-supplied description of one logical request.
///
/// Either `messages` or `prompt` carries the payload; `effective_messages`
/// normalizes the two forms for encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestIntent {
    /// The task class to route on.
    pub capability: Capability,
    /// Conversation history, for chat-shaped requests.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Bare prompt, for completion-shaped requests.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Preferred model identifier; adapters fall back to their configured
    /// model when absent.
    #[serde(default)]
    pub model_hint: Option<String>,
    /// Whether the caller wants incremental deltas.
    pub streaming: bool,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Opaque project label forwarded as a routing hint where the dialect
    /// supports one.
    #[serde(default)]
    pub project_tag: Option<String>,
    /// Overrides router scoring; the preferred provider is tried first.
    #[serde(default)]
    pub preferred_provider: Option<ProviderId>,
    /// Race the top providers of the chain in parallel, keeping the first to
    /// yield a non-empty delta.
    #[serde(default)]
    pub race: bool,
}

impl RequestIntent {
    /// Streaming chat request.
    pub fn chat(messages: Vec<ChatMessage>) -> Self {
        Self {
            capability: Capability::ChatCompletion,
            messages,
            prompt: None,
            model_hint: None,
            streaming: true,
            max_tokens: None,
            temperature: None,
            project_tag: None,
            preferred_provider: None,
            race: false,
        }
    }

    /// Single-shot completion request for the given capability.
    pub fn completion(capability: Capability, prompt: impl Into<String>) -> Self {
        Self {
            capability,
            messages: Vec::new(),
            prompt: Some(prompt.into()),
            model_hint: None,
            streaming: false,
            max_tokens: None,
            temperature: None,
            project_tag: None,
            preferred_provider: None,
            race: false,
        }
    }

    pub fn with_model_hint(mut self, model: impl Into<String>) -> Self {
        self.model_hint = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_project_tag(mut self, tag: impl Into<String>) -> Self {
        self.project_tag = Some(tag.into());
        self
    }

    pub fn with_preferred_provider(mut self, provider: ProviderId) -> Self {
        self.preferred_provider = Some(provider);
        self
    }

    pub fn with_race(mut self, race: bool) -> Self {
        self.race = race;
        self
    }

    /// The message sequence to encode: `messages` as given, or the bare
    /// prompt wrapped as a single user message.
    pub fn effective_messages(&self) -> Vec<ChatMessage> {
        if !self.messages.is_empty() {
            return self.messages.clone();
        }
        match &self.prompt {
            Some(prompt) => vec![ChatMessage::user(prompt.clone())],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_messages_prefers_messages() {
        let intent = RequestIntent::chat(vec![ChatMessage::user("hi")]);
        let messages = intent.effective_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hi");
    }

    #[test]
    fn test_effective_messages_wraps_prompt() {
        let intent = RequestIntent::completion(Capability::CodeCompletion, "fn main(");
        let messages = intent.effective_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "fn main(");
    }

    #[test]
    fn test_builder_chain() {
        let intent = RequestIntent::chat(vec![ChatMessage::user("hi")])
            .with_model_hint("gpt-4o")
            .with_max_tokens(256)
            .with_temperature(0.2)
            .with_race(true);

        assert_eq!(intent.model_hint.as_deref(), Some("gpt-4o"));
        assert_eq!(intent.max_tokens, Some(256));
        assert_eq!(intent.temperature, Some(0.2));
        assert!(intent.race);
    }
}
