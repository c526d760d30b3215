//! 有界工具调用循环
//!
//! 模型响应为工具调用时执行工具、追加 tool 结果消息并再次请求模型；返回纯文本时结束。
//! 循环用显式计数而非递归，工具调用次数超过 budget 即返回 BudgetExceeded，
//! 返回前为每个未执行的调用补一条 tool_budget_exceeded 错误消息。
//! 工具失败不会中断循环：错误作为 tool 消息交还给模型，由模型决定是否重试。

use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::memory::Message;
use crate::tools::ToolExecutor;

/// 预算耗尽后未执行的工具调用的错误类型
pub const TOOL_BUDGET_EXCEEDED: &str = "tool_budget_exceeded";

/// 循环正常结束
#[derive(Debug, Clone)]
pub struct ToolLoopOutcome {
    /// 本轮新产生的消息（工具请求、工具结果、最终回复），最后一条为最终回复
    pub messages: Vec<Message>,
    /// 模型最终的纯文本回复
    pub final_text: String,
    /// 实际执行的工具调用次数
    pub tool_calls: usize,
}

/// 循环异常结束；均携带已产生的消息
#[derive(Debug, Clone)]
pub enum ToolLoopError {
    Llm {
        source: LlmError,
        messages: Vec<Message>,
    },
    BudgetExceeded {
        budget: usize,
        messages: Vec<Message>,
    },
}

impl ToolLoopError {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            ToolLoopError::Llm { messages, .. } | ToolLoopError::BudgetExceeded { messages, .. } => {
                messages
            }
        }
    }
}

/// 运行工具调用循环：system + history + 本轮产生的消息 -> 模型
pub async fn run_tool_loop(
    llm: &dyn LlmClient,
    system_prompt: &str,
    history: &[Message],
    executor: &ToolExecutor,
    budget: usize,
) -> Result<ToolLoopOutcome, ToolLoopError> {
    let tools = executor.specs();
    let mut produced: Vec<Message> = Vec::new();
    let mut calls_made = 0usize;

    loop {
        let mut messages = Vec::with_capacity(history.len() + produced.len() + 1);
        messages.push(Message::system(system_prompt));
        messages.extend_from_slice(history);
        messages.extend_from_slice(&produced);
        let request = CompletionRequest::new(messages).with_tools(tools.clone());

        let response = match llm.complete(&request).await {
            Ok(r) => r,
            Err(source) => {
                return Err(ToolLoopError::Llm {
                    source,
                    messages: produced,
                })
            }
        };

        if !response.is_tool_call() {
            let final_text = response.content;
            produced.push(Message::assistant(final_text.clone()));
            return Ok(ToolLoopOutcome {
                messages: produced,
                final_text,
                tool_calls: calls_made,
            });
        }

        produced.push(Message::assistant_tool_calls(
            response.content,
            &response.tool_calls,
        ));

        let mut calls = response.tool_calls.into_iter();
        while let Some(call) = calls.next() {
            if calls_made >= budget {
                tracing::warn!(budget, tool = %call.name, "tool-call budget exhausted");
                // 每个未执行的调用都要有对应的 tool 消息，轨迹才能原样回放给模型
                for skipped in std::iter::once(call).chain(calls) {
                    produced.push(Message::tool_error(
                        &skipped,
                        TOOL_BUDGET_EXCEEDED,
                        format!("tool-call budget of {budget} calls exhausted, call not executed"),
                    ));
                }
                return Err(ToolLoopError::BudgetExceeded {
                    budget,
                    messages: produced,
                });
            }
            calls_made += 1;

            let result = executor.execute(&call.name, call.arguments.clone()).await;
            let msg = match result {
                Ok(output) => Message::tool_result(&call, output),
                Err(e) => {
                    tracing::warn!(tool = %call.name, kind = e.kind(), error = %e, "tool call failed");
                    Message::tool_error(&call, e.kind(), &e)
                }
            };
            produced.push(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, MockLlmClient, ToolCall};
    use crate::memory::Role;
    use crate::publish::{MockPublisher, PublishError};
    use crate::tools::{PublishTool, ToolRegistry, PUBLISH_TOOL};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn publish_executor(backend: Arc<MockPublisher>) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(PublishTool::new(backend, "publish-test"));
        ToolExecutor::new(registry, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_plain_response_ends_loop_without_tools() {
        let llm = MockLlmClient::new();
        llm.push_text("done");
        let executor = publish_executor(Arc::new(MockPublisher::new()));

        let out = run_tool_loop(&llm, "sys", &[Message::human("hi")], &executor, 5)
            .await
            .unwrap();
        assert_eq!(out.final_text, "done");
        assert_eq!(out.tool_calls, 0);
        assert_eq!(out.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_results_are_fed_back() {
        let llm = MockLlmClient::new();
        llm.push_tool_call(PUBLISH_TOOL, json!({"text": "gm"}));
        llm.push_text("posted");
        let backend = Arc::new(MockPublisher::new());
        let executor = publish_executor(backend.clone());

        let out = run_tool_loop(&llm, "sys", &[Message::human("post gm")], &executor, 5)
            .await
            .unwrap();

        assert_eq!(out.tool_calls, 1);
        let roles: Vec<Role> = out.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::Tool, Role::Assistant]);
        // 第二次请求包含工具结果
        let second = &llm.requests()[1];
        assert_eq!(second.messages.last().map(|m| m.role), Some(Role::Tool));
        assert_eq!(backend.live_posts().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_error_is_recorded_not_dropped() {
        let llm = MockLlmClient::new();
        llm.push_tool_call(PUBLISH_TOOL, json!({"text": "gm"}));
        llm.push_text("gave up");
        let backend = Arc::new(MockPublisher::new());
        backend.fail_next(PublishError::Rejected("duplicate content".into()));
        let executor = publish_executor(backend);

        let out = run_tool_loop(&llm, "sys", &[], &executor, 5).await.unwrap();
        let tool_msg = &out.messages[1];
        assert!(tool_msg.is_error());
        assert!(tool_msg.content.contains("duplicate content"));
    }

    #[tokio::test]
    async fn test_budget_is_enforced() {
        let llm = MockLlmClient::new();
        for _ in 0..10 {
            llm.push_tool_call(PUBLISH_TOOL, json!({"text": "again"}));
        }
        let executor = publish_executor(Arc::new(MockPublisher::new()));

        let err = run_tool_loop(&llm, "sys", &[], &executor, 3).await.unwrap_err();
        match err {
            ToolLoopError::BudgetExceeded { budget, messages } => {
                assert_eq!(budget, 3);
                let tool_msgs: Vec<&Message> =
                    messages.iter().filter(|m| m.role == Role::Tool).collect();
                assert_eq!(tool_msgs.iter().filter(|m| !m.is_error()).count(), 3);
                assert_eq!(tool_msgs.len(), 4);
                assert!(tool_msgs[3].content.contains("budget"));
                assert_unanswered_calls_absent(&messages);
            }
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }
        assert_eq!(llm.call_count(), 4);
    }

    /// 每个 assistant 工具调用都必须有 tool_call_id 相同的 tool 消息
    fn assert_unanswered_calls_absent(messages: &[Message]) {
        let answered: Vec<&str> = messages.iter().filter_map(|m| m.tool_call_id()).collect();
        for call in messages.iter().flat_map(|m| m.tool_calls()) {
            assert!(
                answered.contains(&call.id.as_str()),
                "tool call {} has no tool message",
                call.id
            );
        }
    }

    #[tokio::test]
    async fn test_budget_exhausted_mid_response_answers_every_call() {
        let llm = MockLlmClient::new();
        let batch = (0..3)
            .map(|i| ToolCall {
                id: format!("batch_{i}"),
                name: PUBLISH_TOOL.to_string(),
                arguments: json!({"text": "gm"}),
            })
            .collect();
        llm.push_response(Ok(LlmResponse::tool_calls(batch)));
        let backend = Arc::new(MockPublisher::new());
        let executor = publish_executor(backend.clone());

        let err = run_tool_loop(&llm, "sys", &[], &executor, 1).await.unwrap_err();
        let messages = err.into_messages();

        assert_eq!(backend.call_count(), 1);
        let skipped: Vec<&Message> = messages
            .iter()
            .filter(|m| {
                m.metadata.get(crate::memory::META_ERROR).and_then(|v| v.as_str())
                    == Some(TOOL_BUDGET_EXCEEDED)
            })
            .collect();
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].tool_call_id(), Some("batch_1"));
        assert_eq!(skipped[1].tool_call_id(), Some("batch_2"));
        assert_unanswered_calls_absent(&messages);
    }
}
