use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::rotation::Rotator;
use super::types::{
    ChunkStream, CompletionRequest, LlmProvider, Message, ProviderError, Role, StreamChunk, ToolCall,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

pub struct AnthropicConfig {
    pub api_keys: Vec<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub connect_timeout: Duration,
}

pub struct AnthropicAdapter {
    cfg: AnthropicConfig,
    rotator: Rotator,
    client: Client,
}

impl AnthropicAdapter {
    pub fn new(mut cfg: AnthropicConfig) -> Result<Self, ProviderError> {
        if cfg.base_url.is_empty() {
            cfg.base_url = DEFAULT_BASE_URL.to_string();
        }
        if cfg.model.is_empty() {
            cfg.model = DEFAULT_MODEL.to_string();
        }
        if cfg.max_tokens == 0 {
            cfg.max_tokens = 4096;
        }
        let client = Client::builder()
            .connect_timeout(cfg.connect_timeout)
            .build()
            .map_err(|err| ProviderError::new("client_error", &err.to_string(), false))?;
        Ok(Self {
            rotator: Rotator::new(cfg.api_keys.clone()),
            cfg,
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn stream_with_tools(&self, request: CompletionRequest) -> Result<ChunkStream, ProviderError> {
        let key = self
            .rotator
            .next()
            .ok_or_else(|| ProviderError::new("auth_error", "no Anthropic API keys", false))?;
        let model = request.model.clone().unwrap_or_else(|| self.cfg.model.clone());
        let payload = build_payload(
            &request,
            &model,
            request.max_tokens.unwrap_or(self.cfg.max_tokens),
            request.temperature.unwrap_or(self.cfg.temperature),
        );

        let endpoint = format!("{}/v1/messages", self.cfg.base_url.trim_end_matches('/'));
        debug!(model = %model, messages = request.messages.len(), "anthropic stream request");
        let resp = self
            .client
            .post(endpoint)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ProviderError::new("network_error", &err.to_string(), true))?;

        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &body));
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(pump_events(resp, tx));
        Ok(ReceiverStream::new(rx).boxed())
    }
}

fn classify_failure(status: u16, body: &str) -> ProviderError {
    let lowered = body.to_lowercase();
    match status {
        401 | 403 => ProviderError::new("auth_error", body, false),
        429 => ProviderError::new("rate_limit", body, true),
        529 => ProviderError::new("overloaded", body, true),
        _ if lowered.contains("overloaded") => ProviderError::new("overloaded", body, true),
        s if s >= 500 => ProviderError::new("server_error", body, true),
        _ => ProviderError::new("api_error", body, false),
    }
}

/// Reads the SSE body and forwards decoded chunks until the round ends or
/// the receiver goes away.
async fn pump_events(resp: reqwest::Response, tx: mpsc::Sender<StreamChunk>) {
    let mut bytes = resp.bytes_stream();
    let mut decoder = SseDecoder::default();
    let mut round = RoundState::default();

    while let Some(next) = bytes.next().await {
        let data = match next {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, "anthropic stream interrupted");
                let _ = tx
                    .send(StreamChunk::Error {
                        content: format!("stream interrupted: {}", err),
                    })
                    .await;
                return;
            }
        };
        for payload in decoder.push(&data) {
            let event: Value = match serde_json::from_str(&payload) {
                Ok(event) => event,
                Err(_) => continue,
            };
            for chunk in round.apply(&event) {
                let last = matches!(chunk, StreamChunk::Done | StreamChunk::Error { .. });
                if tx.send(chunk).await.is_err() {
                    debug!("stream receiver dropped");
                    return;
                }
                if last {
                    return;
                }
            }
        }
    }
    let _ = tx
        .send(StreamChunk::Error {
            content: "stream ended before message_stop".to_string(),
        })
        .await;
}

/// Splits a byte stream into the `data:` payloads of complete SSE events.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend(bytes.iter().filter(|b| **b != b'\r'));
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            let text = String::from_utf8_lossy(&frame);
            let data: Vec<&str> = text
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim_start)
                .collect();
            if !data.is_empty() {
                payloads.push(data.join("\n"));
            }
        }
        payloads
    }
}

struct PendingCall {
    index: u64,
    id: String,
    name: String,
    json: String,
}

/// Accumulates one round: text passes straight through, tool-use blocks are
/// assembled from partial JSON and released together at `message_stop`.
#[derive(Default)]
pub(crate) struct RoundState {
    calls: Vec<PendingCall>,
}

impl RoundState {
    pub(crate) fn apply(&mut self, event: &Value) -> Vec<StreamChunk> {
        let kind = event.get("type").and_then(Value::as_str).unwrap_or_default();
        let index = event.get("index").and_then(Value::as_u64).unwrap_or(0);
        match kind {
            "content_block_start" => {
                let block = &event["content_block"];
                if block["type"] == "tool_use" {
                    self.calls.push(PendingCall {
                        index,
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        json: String::new(),
                    });
                }
                Vec::new()
            }
            "content_block_delta" => {
                let delta = &event["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => {
                        let text = delta["text"].as_str().unwrap_or_default();
                        if text.is_empty() {
                            Vec::new()
                        } else {
                            vec![StreamChunk::Text {
                                content: text.to_string(),
                            }]
                        }
                    }
                    Some("input_json_delta") => {
                        if let Some(call) = self.calls.iter_mut().find(|c| c.index == index) {
                            call.json.push_str(delta["partial_json"].as_str().unwrap_or_default());
                        }
                        Vec::new()
                    }
                    _ => Vec::new(),
                }
            }
            "message_stop" => {
                let mut out = Vec::new();
                let calls = self.take_calls();
                if !calls.is_empty() {
                    out.push(StreamChunk::ToolCalls { calls });
                }
                out.push(StreamChunk::Done);
                out
            }
            "error" => {
                let message = event
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown provider error");
                vec![StreamChunk::Error {
                    content: message.to_string(),
                }]
            }
            _ => Vec::new(),
        }
    }

    fn take_calls(&mut self) -> Vec<ToolCall> {
        self.calls
            .drain(..)
            .map(|call| {
                let raw = call.json.trim();
                let arguments = if raw.is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
                };
                ToolCall {
                    id: call.id,
                    name: call.name,
                    arguments,
                }
            })
            .collect()
    }
}

/// Maps the conversation onto Messages API turns. Consecutive tool results
/// share one user turn.
pub(crate) fn build_payload(request: &CompletionRequest, model: &str, max_tokens: u32, temperature: f64) -> Value {
    let mut system = request.system.clone();
    let mut turns: Vec<Value> = Vec::new();

    for msg in &request.messages {
        match msg.role {
            Role::System => {
                if !system.is_empty() {
                    system.push_str("\n\n");
                }
                system.push_str(&msg.content);
            }
            Role::User => turns.push(json!({ "role": "user", "content": msg.content })),
            // The API rejects assistant turns with empty content.
            Role::Assistant if msg.content.is_empty() && msg.tool_calls.is_empty() => {}
            Role::Assistant => turns.push(assistant_turn(msg)),
            Role::Tool => {
                let block = tool_result_block(msg);
                let merged = turns.last_mut().and_then(|last| {
                    if last["role"] != "user" {
                        return None;
                    }
                    last["content"].as_array_mut()
                });
                match merged {
                    Some(blocks) if blocks.iter().all(|b| b["type"] == "tool_result") => blocks.push(block),
                    _ => turns.push(json!({ "role": "user", "content": [block] })),
                }
            }
        }
    }

    let mut payload = json!({
        "model": model,
        "max_tokens": max_tokens,
        "temperature": temperature,
        "stream": true,
        "messages": turns,
    });
    if !system.is_empty() {
        payload["system"] = json!(system);
    }
    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect();
        payload["tools"] = json!(tools);
    }
    payload
}

fn assistant_turn(msg: &Message) -> Value {
    if msg.tool_calls.is_empty() {
        return json!({ "role": "assistant", "content": msg.content });
    }
    let mut blocks = Vec::new();
    if !msg.content.is_empty() {
        blocks.push(json!({ "type": "text", "text": msg.content }));
    }
    for call in &msg.tool_calls {
        let input = if call.arguments.is_object() {
            call.arguments.clone()
        } else {
            json!({})
        };
        blocks.push(json!({
            "type": "tool_use",
            "id": call.id,
            "name": call.name,
            "input": input,
        }));
    }
    json!({ "role": "assistant", "content": blocks })
}

fn tool_result_block(msg: &Message) -> Value {
    let is_error = serde_json::from_str::<Value>(&msg.content)
        .map(|v| v.get("error").is_some())
        .unwrap_or(false);
    let mut block = json!({
        "type": "tool_result",
        "tool_use_id": msg.tool_call_id.clone().unwrap_or_default(),
        "content": msg.content,
    });
    if is_error {
        block["is_error"] = json!(true);
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolSchema;

    fn request(messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            system: "You help with job searches.".to_string(),
            messages,
            tools: vec![ToolSchema {
                name: "list_jobs".to_string(),
                description: "List jobs".to_string(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            }],
            model: None,
            temperature: None,
            max_tokens: None,
            provider: None,
        }
    }

    fn adapter(base_url: String) -> AnthropicAdapter {
        AnthropicAdapter::new(AnthropicConfig {
            api_keys: vec!["sk-test".to_string()],
            base_url,
            model: String::new(),
            max_tokens: 0,
            temperature: 0.3,
            connect_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn tool_results_merge_into_one_user_turn() {
        let call_a = ToolCall {
            id: "toolu_a".to_string(),
            name: "list_jobs".to_string(),
            arguments: json!({}),
        };
        let call_b = ToolCall {
            id: "toolu_b".to_string(),
            name: "read_resume".to_string(),
            arguments: json!({}),
        };
        let messages = vec![
            Message::user("What have I saved?"),
            Message::assistant("Checking.", vec![call_a.clone(), call_b.clone()]),
            Message::tool(&call_a, &json!({"jobs": [], "count": 0})),
            Message::tool(&call_b, &json!({"error": "No resume uploaded."})),
        ];
        let payload = build_payload(&request(messages), "m", 1024, 0.3);
        let turns = payload["messages"].as_array().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1]["content"][1]["type"], "tool_use");
        let results = turns[2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1]["tool_use_id"], "toolu_b");
        assert_eq!(results[1]["is_error"], true);
        assert_eq!(payload["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(payload["system"], "You help with job searches.");
    }

    #[test]
    fn empty_assistant_turns_are_dropped() {
        let messages = vec![
            Message::user("hello"),
            Message::assistant("", Vec::new()),
            Message::user("still there?"),
            Message::assistant("Yes.", Vec::new()),
        ];
        let payload = build_payload(&request(messages), "m", 1024, 0.3);
        let turns = payload["messages"].as_array().unwrap();
        let roles: Vec<&str> = turns.iter().map(|t| t["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["user", "user", "assistant"]);
        assert_eq!(turns[2]["content"], "Yes.");
    }

    #[test]
    fn decoder_handles_split_frames() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: ping\r\ndata: {\"type\":").is_empty());
        let out = decoder.push(b"\"ping\"}\r\n\r\nevent: x\ndata: 1\n\n");
        assert_eq!(out, vec![r#"{"type":"ping"}"#.to_string(), "1".to_string()]);
    }

    #[test]
    fn tool_use_blocks_are_assembled() {
        let mut round = RoundState::default();
        let events = [
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Searching"}}),
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "job_search", "input": {}}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"query\": \"ru"}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "st\"}"}}),
            json!({"type": "message_stop"}),
        ];
        let chunks: Vec<StreamChunk> = events.iter().flat_map(|e| round.apply(e)).collect();
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Text {
                    content: "Searching".to_string()
                },
                StreamChunk::ToolCalls {
                    calls: vec![ToolCall {
                        id: "toolu_1".to_string(),
                        name: "job_search".to_string(),
                        arguments: json!({"query": "rust"}),
                    }]
                },
                StreamChunk::Done,
            ]
        );
    }

    #[tokio::test]
    async fn streams_from_server() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{}}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
        );
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-test")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let stream = adapter(server.url())
            .stream_with_tools(request(vec![Message::user("hi")]))
            .await
            .unwrap();
        let chunks: Vec<StreamChunk> = stream.collect().await;
        mock.assert_async().await;
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Text {
                    content: "Hi".to_string()
                },
                StreamChunk::Done
            ]
        );
    }

    #[tokio::test]
    async fn http_failures_are_classified() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(429)
            .with_body(r#"{"type":"error","error":{"type":"rate_limit_error"}}"#)
            .create_async()
            .await;
        let err = adapter(server.url())
            .stream_with_tools(request(vec![Message::user("hi")]))
            .await
            .err()
            .unwrap();
        assert_eq!(err.code, "rate_limit");
        assert!(err.retryable);
    }
}
