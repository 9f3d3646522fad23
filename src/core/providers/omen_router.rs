//! OmenRouter wire dialect
//!
//! The router service accepts OpenAI-compatible bodies extended with a `tags`
//! object of routing hints, and its stream events may use either the OpenAI
//! chunk shape or the router's native `{content, final}` form.

use serde_json::{Value, json};

use crate::core::error::Result;
use crate::core::providers::openai_compat;
use crate::core::types::{ChatResponse, Delta, RequestIntent};

/// Client identifier expected by the router's `tags.source` hint.
const SOURCE_TAG: &str = "zeke";

/// Build the chat body with routing-hint tags attached.
pub fn encode_body(intent: &RequestIntent, model: &str, stream: bool) -> Value {
    let mut body = openai_compat::encode_body(intent, model, stream);

    let mut tags = serde_json::Map::new();
    tags.insert("intent".to_string(), json!(intent.capability.name()));
    tags.insert("source".to_string(), json!(SOURCE_TAG));
    if let Some(tag) = &intent.project_tag {
        tags.insert("language".to_string(), json!(tag));
    }
    body["tags"] = Value::Object(tags);

    body
}

/// Non-streaming responses are plain OpenAI-compatible.
pub fn decode_response(provider: &'static str, body: &[u8]) -> Result<ChatResponse> {
    openai_compat::decode_response(provider, body)
}

/// Decode one streaming event payload.
///
/// Native router events carry `content` plus an explicit `final` boolean;
/// passthrough events from upstream backends keep the OpenAI chunk shape and
/// are delegated.
pub fn decode_stream_event(provider: &'static str, payload: &str) -> Result<Option<Delta>> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) => return openai_compat::decode_stream_event(provider, payload),
    };

    if value.get("choices").is_some() {
        return openai_compat::decode_stream_event(provider, payload);
    }

    let content = value
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default();
    let finished = value
        .get("final")
        .and_then(|f| f.as_bool())
        .unwrap_or(false);

    if finished {
        let delta = if content.is_empty() {
            Delta::finished()
        } else {
            Delta::final_text(content)
        };
        return Ok(Some(delta));
    }

    if content.is_empty() {
        return Ok(None);
    }

    Ok(Some(Delta::text(content)))
}
