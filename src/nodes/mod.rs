//! 图节点：分类、撰写、发布
//!
//! 每个节点读取当前 ConversationState，返回 StateUpdate 局部更新，由执行器 merge。
//! 失败时返回 NodeFailure：除错误本身外还携带失败前已产生的消息，保证轨迹完整。

pub mod author;
pub mod classifier;
pub mod prompts;
pub mod publisher;
pub mod tool_loop;

use async_trait::async_trait;

use crate::core::OrchestratorError;
use crate::workflow::{ConversationState, StateUpdate};

pub use author::AuthoringNode;
pub use classifier::{parse_intent_flags, ClassifierNode};
pub use publisher::PublishingNode;
pub use tool_loop::{run_tool_loop, ToolLoopError, ToolLoopOutcome, TOOL_BUDGET_EXCEEDED};

/// 单次调用的上下文（节点只读）
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    /// 本次调用的发布幂等键
    pub fn idempotency_key(&self) -> String {
        format!("publish-{}", self.run_id)
    }
}

/// 节点失败：错误 + 失败前产生的局部更新
#[derive(Debug, Clone)]
pub struct NodeFailure {
    pub error: OrchestratorError,
    pub partial: StateUpdate,
}

impl NodeFailure {
    pub fn with_partial(error: OrchestratorError, partial: StateUpdate) -> Self {
        Self { error, partial }
    }
}

impl From<OrchestratorError> for NodeFailure {
    fn from(error: OrchestratorError) -> Self {
        Self {
            error,
            partial: StateUpdate::default(),
        }
    }
}

/// 图节点 trait
#[async_trait]
pub trait GraphNode: Send + Sync {
    async fn run(
        &self,
        state: &ConversationState,
        ctx: &RunContext,
    ) -> Result<StateUpdate, NodeFailure>;
}
