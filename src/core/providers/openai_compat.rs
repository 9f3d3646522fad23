//! OpenAI-compatible wire dialect
//!
//! Shared request/response encoding for every backend speaking the
//! `/v1/chat/completions` contract (OpenAI-compatible servers, xAI, Azure
//! deployments, and the router dialect's body). The Anthropic dialect has its
//! own module and deliberately shares nothing with this one.

use serde_json::{Value, json};

use crate::core::error::{RelayError, Result};
use crate::core::types::{ChatResponse, Delta, RequestIntent, Usage};

/// Build the chat-completions JSON body.
pub fn encode_body(intent: &RequestIntent, model: &str, stream: bool) -> Value {
    let mut body = json!({
        "model": model,
        "messages": intent.effective_messages(),
        "stream": stream,
    });

    if let Some(temperature) = intent.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = intent.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    body
}

/// Decode a non-streaming chat-completions response.
pub fn decode_response(provider: &'static str, body: &[u8]) -> Result<ChatResponse> {
    let value: Value = serde_json::from_slice(body).map_err(|e| RelayError::InvalidResponse {
        provider,
        message: format!("response is not valid JSON: {}", e),
    })?;

    let content = value
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .ok_or_else(|| RelayError::InvalidResponse {
            provider,
            message: "missing choices[0].message.content".to_string(),
        })?
        .to_string();

    let model = value
        .get("model")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(ChatResponse {
        content,
        model,
        usage: decode_usage(&value),
    })
}

/// Decode one streaming event payload.
///
/// Returns `Ok(None)` for frames that carry neither content nor a finish
/// reason (role-only first chunks, keep-alives). The terminal frame is the one
/// whose `choices[0].finish_reason` is non-null; content on the terminal
/// frame is preserved.
pub fn decode_stream_event(provider: &'static str, payload: &str) -> Result<Option<Delta>> {
    let value: Value = serde_json::from_str(payload).map_err(|e| RelayError::InvalidResponse {
        provider,
        message: format!("stream event is not valid JSON: {}", e),
    })?;

    let choice = match value
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
    {
        Some(choice) => choice,
        None => return Ok(None),
    };

    let content = choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default();

    let finished = choice
        .get("finish_reason")
        .map(|r| !r.is_null())
        .unwrap_or(false);

    if finished {
        let delta = if content.is_empty() {
            Delta::finished()
        } else {
            Delta::final_text(content)
        };
        return Ok(Some(match decode_usage(&value) {
            Some(usage) => delta.with_token_count(usage.completion_tokens),
            None => delta,
        }));
    }

    if content.is_empty() {
        return Ok(None);
    }

    Ok(Some(Delta::text(content)))
}

fn decode_usage(value: &Value) -> Option<Usage> {
    let usage = value.get("usage")?;
    let prompt = usage.get("prompt_tokens")?.as_u64()? as u32;
    let completion = usage.get("completion_tokens")?.as_u64()? as u32;
    Some(Usage::new(prompt, completion))
}
