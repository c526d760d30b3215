//! 发布节点：以发布工具驱动有界工具调用循环
//!
//! 每次编排调用只有一个幂等键（publish-{run_id}），模型重试或重复调用发布工具都不会产生第二条帖子。
//! 发布失败写回轨迹交给模型；工具调用次数超过预算时抛出 PublishRecursionExceeded。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::OrchestratorError;
use crate::llm::LlmClient;
use crate::memory::META_INTENT_WARNING;
use crate::nodes::prompts::PUBLISH_PROMPT;
use crate::nodes::{run_tool_loop, GraphNode, NodeFailure, RunContext, ToolLoopError};
use crate::publish::Publisher;
use crate::tools::{PublishTool, ToolExecutor, ToolRegistry};
use crate::workflow::{ConversationState, NodeId, StateUpdate};

/// 没有任何已撰写正文就进入发布
pub const WARN_NO_AUTHORED_CONTENT: &str = "publish_without_authored_content";
/// 只有撰写意图、没有发布意图，却沿固定边进入发布
pub const WARN_NO_POST_INTENT: &str = "publish_without_post_intent";

pub struct PublishingNode {
    llm: Arc<dyn LlmClient>,
    publisher: Arc<dyn Publisher>,
    tool_budget: usize,
    tool_timeout: Duration,
}

impl PublishingNode {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        publisher: Arc<dyn Publisher>,
        tool_budget: usize,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            publisher,
            tool_budget,
            tool_timeout,
        }
    }

    /// 意图歧义检查（仅提示，不改变流程）；缺少发布意图优先于缺少正文
    fn intent_warning(state: &ConversationState) -> Option<&'static str> {
        let flags = state.intent_flags();
        if flags.is_writer_query && !flags.is_post_query {
            Some(WARN_NO_POST_INTENT)
        } else if !state.has_authored_content() {
            Some(WARN_NO_AUTHORED_CONTENT)
        } else {
            None
        }
    }
}

#[async_trait]
impl GraphNode for PublishingNode {
    async fn run(
        &self,
        state: &ConversationState,
        ctx: &RunContext,
    ) -> Result<StateUpdate, NodeFailure> {
        let key = ctx.idempotency_key();
        let mut registry = ToolRegistry::new();
        registry.register(PublishTool::new(self.publisher.clone(), key.clone()));
        let executor = ToolExecutor::new(registry, self.tool_timeout);

        let warning = Self::intent_warning(state);
        if let Some(w) = warning {
            tracing::warn!(run_id = %ctx.run_id, warning = w, "publishing with ambiguous intent");
        }
        let tag = |mut messages: Vec<crate::memory::Message>| {
            if let (Some(w), Some(first)) = (warning, messages.first_mut()) {
                first
                    .metadata
                    .insert(META_INTENT_WARNING.to_string(), Value::String(w.to_string()));
            }
            messages
        };

        let outcome = run_tool_loop(
            self.llm.as_ref(),
            PUBLISH_PROMPT,
            state.messages(),
            &executor,
            self.tool_budget,
        )
        .await;

        match outcome {
            Ok(outcome) => {
                tracing::info!(
                    run_id = %ctx.run_id,
                    idempotency_key = %key,
                    publish_calls = outcome.tool_calls,
                    "publishing finished"
                );
                Ok(StateUpdate::messages(tag(outcome.messages)))
            }
            Err(ToolLoopError::Llm { source, messages }) => Err(NodeFailure::with_partial(
                OrchestratorError::Llm {
                    node: NodeId::Publish,
                    source,
                },
                StateUpdate::messages(tag(messages)),
            )),
            Err(ToolLoopError::BudgetExceeded { budget, messages }) => {
                Err(NodeFailure::with_partial(
                    OrchestratorError::PublishRecursionExceeded { budget },
                    StateUpdate::messages(tag(messages)),
                ))
            }
        }
    }
}
