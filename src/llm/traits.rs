//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：一次 complete 同时支持三种用法：
//! 自由文本（撰写）、schema 约束的结构化输出（分类）、工具调用（发布 / 链上查询）。
//! RetryingLlmClient 在调用点为瞬时错误（超时、限流、网络）提供有界退避重试。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::memory::Message;

/// 暴露给模型的可调用工具描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// 参数 JSON Schema
    pub parameters: Value,
}

/// 模型返回的一次工具调用请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// 结构化输出约束：名称 + JSON Schema
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

/// 单次补全请求
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub output_schema: Option<OutputSchema>,
    pub tools: Vec<ToolSpec>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// 模型响应：纯文本，或者一组工具调用请求（content 可能同时携带说明文字）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl LlmResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls: calls,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// LLM 调用错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM rate limited (retry after {retry_after_ms} ms)")]
    RateLimited { retry_after_ms: u64 },

    #[error("LLM network error: {0}")]
    Network(String),

    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("LLM returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// 超时、限流、网络错误可以重试；API 拒绝与响应格式错误不重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout(_) | LlmError::RateLimited { .. } | LlmError::Network(_)
        )
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 单次补全（不含重试）
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError>;
}

/// 重试策略：最多重试次数、指数退避上下限、单次请求超时
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// 第 attempt 次失败后的等待时间（attempt 从 0 开始）；限流时尊重服务端给出的 retry_after
    pub fn backoff_for(&self, attempt: u32, err: &LlmError) -> Duration {
        let exp = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        let wait = match err {
            LlmError::RateLimited { retry_after_ms } => {
                exp.max(Duration::from_millis(*retry_after_ms))
            }
            _ => exp,
        };
        wait.min(self.max_backoff)
    }
}

/// 带超时与有界重试的 LLM 包装器
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        let mut attempt = 0;
        loop {
            let result =
                match tokio::time::timeout(self.config.request_timeout, self.inner.complete(request))
                    .await
                {
                    Ok(r) => r,
                    Err(_) => Err(LlmError::Timeout(self.config.request_timeout)),
                };

            match result {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let wait = self.config.backoff_for(attempt, &e);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "transient LLM failure, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
