//! Mock LLM 客户端（用于测试与 dry-run，无需 API）
//!
//! 按顺序吐出预先排好的响应（文本 / 工具调用 / 错误），并记录每次收到的请求，
//! 便于断言节点发给模型的内容。队列耗尽后返回固定的兜底文本。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{CompletionRequest, LlmClient, LlmError, LlmResponse, ToolCall};

/// 队列耗尽时的默认回复
pub const MOCK_FALLBACK_REPLY: &str = "(mock) nothing left to say";

/// Mock 客户端：脚本化响应 + 请求记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
    next_call_id: AtomicUsize,
    delay: Option<Duration>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用前先等待一段时间（用于超时测试）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_response(&self, response: Result<LlmResponse, LlmError>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push_response(Ok(LlmResponse::text(text)));
    }

    /// 排入一次工具调用，调用 ID 自动编号
    pub fn push_tool_call(&self, name: &str, arguments: Value) {
        let id = format!("call_{}", self.next_call_id.fetch_add(1, Ordering::Relaxed));
        self.push_response(Ok(LlmResponse::tool_calls(vec![ToolCall {
            id,
            name: name.to_string(),
            arguments,
        }])));
    }

    pub fn push_error(&self, err: LlmError) {
        self.push_response(Err(err));
    }

    /// 已收到的调用次数（含返回错误的调用）
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 已收到的请求快照
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 尚未消费的脚本条数
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        next.unwrap_or_else(|| Ok(LlmResponse::text(MOCK_FALLBACK_REPLY)))
    }
}
