//! OpenAI 兼容 API 客户端
//!
//! 直接调用 `{base_url}/chat/completions`；支持 OpenAI、Gemini 的 OpenAI 兼容端点、自建代理等。
//! 工具调用走 `tools` 字段，结构化输出走 `response_format: json_schema`。
//! HTTP 状态码映射为 LlmError：429 -> RateLimited，5xx -> Network（可重试），其它 4xx -> ApiError。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{CompletionRequest, LlmClient, LlmError, LlmResponse, ToolCall};
use crate::memory::{Message, Role};

/// Gemini 的 OpenAI 兼容端点
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// 429 未携带 Retry-After 时的默认等待
const DEFAULT_RETRY_AFTER_MS: u64 = 1000;

/// OpenAI 兼容客户端：持有 HTTP client、端点、model 名与 key
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    /// 组装请求体（不含鉴权）
    pub fn build_body(&self, request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(to_wire_message).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
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
            body["tools"] = Value::Array(tools);
        }

        if let Some(schema) = &request.output_schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                }
            });
        }

        body
    }
}

fn to_wire_message(m: &Message) -> Value {
    match m.role {
        Role::System => json!({"role": "system", "content": m.content}),
        Role::Human => json!({"role": "user", "content": m.content}),
        Role::Assistant => {
            let calls = m.tool_calls();
            if calls.is_empty() {
                json!({"role": "assistant", "content": m.content})
            } else {
                let wire_calls: Vec<Value> = calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": {
                                "name": c.name,
                                "arguments": c.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                json!({"role": "assistant", "content": m.content, "tool_calls": wire_calls})
            }
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": m.tool_call_id().unwrap_or_default(),
            "content": m.content,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// 解析响应 JSON 为 LlmResponse；arguments 不是合法 JSON 时保留原始字符串
fn parse_completion(raw: ChatCompletion) -> Result<LlmResponse, LlmError> {
    let choice = raw
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|c| ToolCall {
            id: c.id,
            name: c.function.name,
            arguments: serde_json::from_str(&c.function.arguments)
                .unwrap_or(Value::String(c.function.arguments)),
        })
        .collect();

    Ok(LlmResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
    })
}

/// Retry-After（秒）换算为毫秒；缺失或无法解析时用默认值，超大值饱和而不溢出
fn parse_retry_after(header: Option<&str>) -> u64 {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
        .unwrap_or(DEFAULT_RETRY_AFTER_MS)
}

fn map_transport_error(e: reqwest::Error, timeout: Duration) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Network(e.to_string())
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        let body = self.build_body(request);
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = parse_retry_after(
                response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            return Err(LlmError::RateLimited { retry_after_ms });
        }
        if status.is_server_error() {
            return Err(LlmError::Network(format!("server returned {status}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!("{status}: {text}")));
        }

        let raw: ChatCompletion = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parse_completion(raw)
    }
}
