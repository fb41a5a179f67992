//! Normalized request bodies and response decoding.
//!
//! Every built-in variant is addressed with one chat-completions style JSON shape; the
//! transport owns any further translation.

use crate::types::{ChatRequest, ChatResponse, StreamEvent, ToolCall, Usage};
use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub(crate) fn chat_body(model: &str, request: &ChatRequest, stream: bool) -> Value {
    let messages: Vec<Value> = request
        .messages()
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect();

    let mut body = Map::new();
    body.insert("model".into(), json!(model));
    body.insert("messages".into(), Value::Array(messages));
    body.insert("stream".into(), json!(stream));

    let params = request.params();
    if let Some(t) = params.temperature {
        body.insert("temperature".into(), json!(t));
    }
    if let Some(n) = params.max_tokens {
        body.insert("max_tokens".into(), json!(n));
    }
    if let Some(tools) = params.tools.as_ref().filter(|t| !t.is_empty()) {
        let tools: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        body.insert("tools".into(), Value::Array(tools));
    }
    Value::Object(body)
}

/// Minimal one-token round trip used by health checks.
pub(crate) fn probe_body(model: &str) -> Value {
    json!({
        "model": model,
        "messages": [{ "role": "user", "content": "ping" }],
        "max_tokens": 1,
        "stream": false,
    })
}

pub(crate) fn image_body(model: &str, prompt: &str, count: u32) -> Value {
    json!({ "model": model, "prompt": prompt, "n": count.max(1) })
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default, alias = "delta")]
    message: Option<WireMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: WireFunction,
}

#[derive(Debug, Default, Deserialize)]
struct WireFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl WireToolCall {
    fn into_call(self) -> ToolCall {
        // Arguments usually arrive as a JSON-encoded string.
        let arguments = match self.function.arguments {
            Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
            other => other,
        };
        ToolCall {
            id: self.id.unwrap_or_default(),
            name: self.function.name.unwrap_or_default(),
            arguments,
        }
    }
}

fn decode_error(provider: &str, msg: impl Into<String>) -> Error {
    Error::Serialization {
        message: msg.into(),
        context: ErrorContext::new()
            .with_provider(provider)
            .with_source("provider_payload"),
    }
}

pub(crate) fn parse_chat_response(provider: &str, model: &str, value: Value) -> Result<ChatResponse> {
    let wire: WireResponse = serde_json::from_value(value)
        .map_err(|e| decode_error(provider, format!("malformed response: {}", e)))?;
    let choice = wire
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| decode_error(provider, "response contained no choices"))?;
    let message = choice.message.unwrap_or_default();

    Ok(ChatResponse {
        id: wire.id.unwrap_or_default(),
        content: message.content.unwrap_or_default(),
        provider: provider.to_string(),
        model: model.to_string(),
        usage: wire
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default(),
        finish_reason: choice.finish_reason,
        tool_calls: message
            .tool_calls
            .into_iter()
            .map(WireToolCall::into_call)
            .collect(),
    })
}

/// Events carried by one streamed chunk, plus its finish reason if present.
pub(crate) fn parse_stream_chunk(value: Value) -> (Vec<StreamEvent>, Option<String>) {
    let wire: WireResponse = match serde_json::from_value(value) {
        Ok(w) => w,
        Err(_) => return (Vec::new(), None),
    };
    let mut events = Vec::new();
    let mut finish_reason = None;
    for choice in wire.choices {
        if let Some(delta) = choice.message {
            if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                events.push(StreamEvent::delta(text));
            }
            for call in delta.tool_calls {
                events.push(StreamEvent::ToolCall {
                    call: call.into_call(),
                });
            }
        }
        if choice.finish_reason.is_some() {
            finish_reason = choice.finish_reason;
        }
    }
    if let Some(u) = wire.usage {
        events.push(StreamEvent::Usage {
            usage: Usage::new(u.prompt_tokens, u.completion_tokens),
        });
    }
    (events, finish_reason)
}

/// One generated image: a hosted URL or inline base64 payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct GeneratedImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
}

pub(crate) fn parse_images(provider: &str, value: Value) -> Result<Vec<GeneratedImage>> {
    #[derive(Deserialize)]
    struct WireImages {
        data: Vec<GeneratedImage>,
    }
    serde_json::from_value::<WireImages>(value)
        .map(|w| w.data)
        .map_err(|e| decode_error(provider, format!("malformed image response: {}", e)))
}
