//! 撰写节点：让模型产出一条可发布的正文，必要时先通过链上查询工具取数
//!
//! 只做内容生成，绝不调用发布能力。任何失败（重试耗尽的瞬时错误、API 拒绝、空内容、查询预算耗尽）
//! 都报告为 Authoring 错误；该错误非致命，执行器照常沿 Author -> Publish 固定边继续。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::chain::ChainQuery;
use crate::core::OrchestratorError;
use crate::llm::LlmClient;
use crate::nodes::prompts::AUTHOR_PROMPT;
use crate::nodes::{run_tool_loop, GraphNode, NodeFailure, RunContext, ToolLoopError};
use crate::tools::{ChainQueryTool, ToolExecutor, ToolRegistry};
use crate::workflow::{ConversationState, StateUpdate};

pub struct AuthoringNode {
    llm: Arc<dyn LlmClient>,
    chain: Option<Arc<dyn ChainQuery>>,
    tool_budget: usize,
    tool_timeout: Duration,
}

impl AuthoringNode {
    pub fn new(llm: Arc<dyn LlmClient>, tool_budget: usize, tool_timeout: Duration) -> Self {
        Self {
            llm,
            chain: None,
            tool_budget,
            tool_timeout,
        }
    }

    /// 绑定链上查询工具
    pub fn with_chain(mut self, chain: Arc<dyn ChainQuery>) -> Self {
        self.chain = Some(chain);
        self
    }

    fn executor(&self) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        if let Some(chain) = &self.chain {
            registry.register(ChainQueryTool::new(chain.clone()));
        }
        ToolExecutor::new(registry, self.tool_timeout)
    }
}

#[async_trait]
impl GraphNode for AuthoringNode {
    async fn run(
        &self,
        state: &ConversationState,
        _ctx: &RunContext,
    ) -> Result<StateUpdate, NodeFailure> {
        let executor = self.executor();
        let outcome = run_tool_loop(
            self.llm.as_ref(),
            AUTHOR_PROMPT,
            state.messages(),
            &executor,
            self.tool_budget,
        )
        .await;

        match outcome {
            Ok(outcome) if outcome.final_text.trim().is_empty() => {
                // 丢弃空的最终回复，只保留查询过程
                let mut messages = outcome.messages;
                messages.pop();
                Err(NodeFailure::with_partial(
                    OrchestratorError::Authoring("model returned empty content".to_string()),
                    StateUpdate::messages(messages),
                ))
            }
            Ok(outcome) => {
                tracing::info!(
                    chars = outcome.final_text.chars().count(),
                    chain_queries = outcome.tool_calls,
                    "content authored"
                );
                Ok(StateUpdate::messages(outcome.messages))
            }
            Err(e) => {
                let reason = match &e {
                    ToolLoopError::Llm { source, .. } => source.to_string(),
                    ToolLoopError::BudgetExceeded { budget, .. } => {
                        format!("chain query budget of {budget} calls exceeded")
                    }
                };
                Err(NodeFailure::with_partial(
                    OrchestratorError::Authoring(reason),
                    StateUpdate::messages(e.into_messages()),
                ))
            }
        }
    }
}
