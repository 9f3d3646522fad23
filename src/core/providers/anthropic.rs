//! Anthropic wire dialect
//!
//! The messages API differs from the OpenAI-compatible family in three ways
//! this module owns completely: system-role messages move to a top-level
//! `system` field, response content arrives as an array of typed blocks, and
//! stream termination is signalled by `stop_reason` rather than a sentinel.
//! `max_tokens` is mandatory on the wire.

use serde_json::{Value, json};

use crate::core::error::{RelayError, Result};
use crate::core::types::{ChatResponse, Delta, MessageRole, RequestIntent, Usage};

/// Versioned API contract sent with every request.
pub const API_VERSION: &str = "2023-06-01";

/// Fallback `max_tokens` when the intent leaves it unset.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Build the messages-API JSON body.
///
/// System messages never appear in the `messages` array; they are joined into
/// the top-level `system` field.
pub fn encode_body(intent: &RequestIntent, model: &str, stream: bool) -> Value {
    let mut system_parts: Vec<String> = Vec::new();
    let mut messages: Vec<Value> = Vec::new();

    for message in intent.effective_messages() {
        match message.role {
            MessageRole::System => system_parts.push(message.content),
            MessageRole::User => messages.push(json!({"role": "user", "content": message.content})),
            MessageRole::Assistant => {
                messages.push(json!({"role": "assistant", "content": message.content}))
            }
        }
    }

    let mut body = json!({
        "model": model,
        "max_tokens": intent.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": messages,
    });

    if !system_parts.is_empty() {
        body["system"] = json!(system_parts.join("\n\n"));
    }
    if let Some(temperature) = intent.temperature {
        body["temperature"] = json!(temperature);
    }
    if stream {
        body["stream"] = json!(true);
    }

    body
}

/// Decode a non-streaming messages-API response.
///
/// Content blocks of type `text` are concatenated; other block types are
/// skipped.
pub fn decode_response(provider: &'static str, body: &[u8]) -> Result<ChatResponse> {
    let value: Value = serde_json::from_slice(body).map_err(|e| RelayError::InvalidResponse {
        provider,
        message: format!("response is not valid JSON: {}", e),
    })?;

    let blocks = value
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| RelayError::InvalidResponse {
            provider,
            message: "missing content block array".to_string(),
        })?;

    let mut content = String::new();
    for block in blocks {
        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
            if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                content.push_str(text);
            }
        }
    }

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
/// `delta.text` carries incremental content; a non-null `stop_reason` (top
/// level, or inside `delta` as emitted by `message_delta` events) or a
/// `message_stop` event terminates the stream. Other event types are
/// keep-alive from this dialect's point of view.
pub fn decode_stream_event(provider: &'static str, payload: &str) -> Result<Option<Delta>> {
    let value: Value = serde_json::from_str(payload).map_err(|e| RelayError::InvalidResponse {
        provider,
        message: format!("stream event is not valid JSON: {}", e),
    })?;

    let stop_reason_set = [&value, value.get("delta").unwrap_or(&Value::Null)]
        .iter()
        .any(|v| {
            v.get("stop_reason")
                .map(|reason| !reason.is_null())
                .unwrap_or(false)
        });
    if stop_reason_set {
        let delta = match output_tokens(&value) {
            Some(count) => Delta::finished().with_token_count(count),
            None => Delta::finished(),
        };
        return Ok(Some(delta));
    }

    if value.get("type").and_then(|t| t.as_str()) == Some("message_stop") {
        return Ok(Some(Delta::finished()));
    }

    let text = value
        .get("delta")
        .and_then(|d| d.get("text"))
        .and_then(|t| t.as_str())
        .unwrap_or_default();

    if text.is_empty() {
        return Ok(None);
    }

    Ok(Some(Delta::text(text)))
}

fn decode_usage(value: &Value) -> Option<Usage> {
    let usage = value.get("usage")?;
    let prompt = usage.get("input_tokens")?.as_u64()? as u32;
    let completion = usage.get("output_tokens")?.as_u64()? as u32;
    Some(Usage::new(prompt, completion))
}

fn output_tokens(value: &Value) -> Option<u32> {
    value
        .get("usage")
        .and_then(|u| u.get("output_tokens"))
        .and_then(|t| t.as_u64())
        .map(|t| t as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::types::ChatMessage;

    fn intent() -> RequestIntent {
        RequestIntent::chat(vec![
            ChatMessage::system("You are terse."),
            ChatMessage::user("ping"),
            ChatMessage::assistant("pong"),
            ChatMessage::user("again"),
        ])
    }

    // ==================== Encoding ====================

    #[test]
    fn test_system_role_extracted_to_top_level() {
        let body = encode_body(&intent(), "claude-sonnet-4-20250514", false);

        assert_eq!(body["system"], "You are terse.");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert!(
            messages
                .iter()
                .all(|m| m["role"] != "system"),
            "system role must not appear in messages"
        );
    }

    #[test]
    fn test_multiple_system_messages_joined() {
        let body = encode_body(
            &RequestIntent::chat(vec![
                ChatMessage::system("a"),
                ChatMessage::system("b"),
                ChatMessage::user("hi"),
            ]),
            "claude-sonnet-4-20250514",
            false,
        );
        assert_eq!(body["system"], "a\n\nb");
    }

    #[test]
    fn test_max_tokens_always_present() {
        let body = encode_body(&intent(), "claude-sonnet-4-20250514", false);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);

        let body = encode_body(&intent().with_max_tokens(128), "claude-sonnet-4-20250514", false);
        assert_eq!(body["max_tokens"], 128);
    }

    #[test]
    fn test_stream_flag_only_when_streaming() {
        let body = encode_body(&intent(), "claude-sonnet-4-20250514", false);
        assert!(body.get("stream").is_none());

        let body = encode_body(&intent(), "claude-sonnet-4-20250514", true);
        assert_eq!(body["stream"], true);
    }

    // ==================== Decoding ====================

    #[test]
    fn test_decode_concatenates_text_blocks() {
        let raw = serde_json::json!({
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "text", "text": "Hello"},
                {"type": "tool_use", "name": "ignored"},
                {"type": "text", "text": ", world"}
            ],
            "usage": {"input_tokens": 9, "output_tokens": 3}
        });
        let response = decode_response("anthropic", raw.to_string().as_bytes()).unwrap();

        assert_eq!(response.content, "Hello, world");
        let usage = response.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 9);
        assert_eq!(usage.total_tokens, 12);
    }

    #[test]
    fn test_decode_missing_content_is_invalid() {
        let err = decode_response("anthropic", br#"{"model":"claude"}"#).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidResponse));
    }

    // ==================== Stream events ====================

    #[test]
    fn test_stream_event_text_delta() {
        let delta = decode_stream_event(
            "anthropic",
            r#"{"type":"content_block_delta","delta":{"text":"Hel"}}"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(delta.content, "Hel");
        assert!(!delta.is_final);
    }

    #[test]
    fn test_stream_event_top_level_stop_reason() {
        let delta = decode_stream_event("anthropic", r#"{"stop_reason":"end_turn"}"#)
            .unwrap()
            .unwrap();
        assert!(delta.is_final);
    }

    #[test]
    fn test_stream_event_message_delta_stop_reason() {
        let delta = decode_stream_event(
            "anthropic",
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":7}}"#,
        )
        .unwrap()
        .unwrap();

        assert!(delta.is_final);
        assert_eq!(delta.token_count, Some(7));
    }

    #[test]
    fn test_stream_event_message_stop() {
        let delta = decode_stream_event("anthropic", r#"{"type":"message_stop"}"#)
            .unwrap()
            .unwrap();
        assert!(delta.is_final);
    }

    #[test]
    fn test_stream_event_bookkeeping_frames_skipped() {
        for payload in [
            r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
            r#"{"type":"content_block_start","index":0}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"ping"}"#,
        ] {
            assert!(
                decode_stream_event("anthropic", payload).unwrap().is_none(),
                "{payload}"
            );
        }
    }
}
