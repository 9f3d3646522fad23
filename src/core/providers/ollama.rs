//! Ollama wire dialect
//!
//! The local daemon speaks its own JSON contract: `/api/chat` for
//! message-shaped requests, `/api/generate` for bare prompts, no
//! authentication, sampling knobs nested under `options`, and streaming as
//! newline-delimited JSON objects with an explicit `done` flag instead of SSE.

use serde_json::{Value, json};

use crate::core::error::{RelayError, Result};
use crate::core::types::{ChatResponse, Delta, RequestIntent, Usage};

/// Endpoint path for this intent: `/api/generate` for bare prompts,
/// `/api/chat` otherwise.
pub fn path_for(intent: &RequestIntent) -> &'static str {
    if intent.messages.is_empty() && intent.prompt.is_some() {
        "/api/generate"
    } else {
        "/api/chat"
    }
}

/// Build the request body matching `path_for`.
pub fn encode_body(intent: &RequestIntent, model: &str, stream: bool) -> Value {
    let mut body = if path_for(intent) == "/api/generate" {
        json!({
            "model": model,
            "prompt": intent.prompt.clone().unwrap_or_default(),
            "stream": stream,
        })
    } else {
        json!({
            "model": model,
            "messages": intent.effective_messages(),
            "stream": stream,
        })
    };

    let mut options = serde_json::Map::new();
    if let Some(temperature) = intent.temperature {
        options.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_tokens) = intent.max_tokens {
        // Ollama spells the output budget num_predict.
        options.insert("num_predict".to_string(), json!(max_tokens));
    }
    if !options.is_empty() {
        body["options"] = Value::Object(options);
    }

    body
}

/// Decode a non-streaming response from either endpoint.
pub fn decode_response(provider: &'static str, body: &[u8]) -> Result<ChatResponse> {
    let value: Value = serde_json::from_slice(body).map_err(|e| RelayError::InvalidResponse {
        provider,
        message: format!("response is not valid JSON: {}", e),
    })?;

    let content = extract_content(&value).ok_or_else(|| RelayError::InvalidResponse {
        provider,
        message: "missing message.content / response field".to_string(),
    })?;

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

/// Decode one streamed JSON line.
///
/// `done: true` terminates the stream; the terminal object may still carry
/// trailing content and the token counters.
pub fn decode_stream_event(provider: &'static str, payload: &str) -> Result<Option<Delta>> {
    let value: Value = serde_json::from_str(payload).map_err(|e| RelayError::InvalidResponse {
        provider,
        message: format!("stream event is not valid JSON: {}", e),
    })?;

    let content = extract_content(&value).unwrap_or_default();
    let done = value.get("done").and_then(|d| d.as_bool()).unwrap_or(false);

    if done {
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

fn extract_content(value: &Value) -> Option<String> {
    if let Some(content) = value
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
    {
        return Some(content.to_string());
    }
    value
        .get("response")
        .and_then(|r| r.as_str())
        .map(|r| r.to_string())
}

fn decode_usage(value: &Value) -> Option<Usage> {
    let prompt = value.get("prompt_eval_count")?.as_u64()? as u32;
    let completion = value.get("eval_count")?.as_u64()? as u32;
    Some(Usage::new(prompt, completion))
}
