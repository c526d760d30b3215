//! 图执行器
//!
//! 一次调用就是一次严格串行的状态机遍历：Start -> Classify -> (Author ->) Publish -> Terminal。
//! 每进入一个节点 step_count +1，超过上限立即以 RecursionLimitExceeded 终止。
//! 节点只返回局部更新，状态只由这里通过 merge 推进；任何错误都会写入轨迹并随报告返回。

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::{OrchestratorError, RunAborted};
use crate::memory::{Message, Role};
use crate::nodes::{GraphNode, RunContext};
use crate::workflow::graph::{next_node, route};
use crate::workflow::types::{merge, ConversationState, IntentFlags, NodeId, StateUpdate};

/// 默认步数上限
pub const DEFAULT_MAX_STEPS: usize = 50;

/// 对外输出的轨迹条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub role: Role,
    pub content: String,
}

/// 一次调用的结果（成功或中止时的部分结果）
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub messages: Vec<Message>,
    /// 实际经过的节点序列；正常结束时以 Terminal 收尾
    pub path: Vec<NodeId>,
    pub step_count: usize,
    pub intent_flags: IntentFlags,
    /// 非致命错误（撰写失败）
    pub errors: Vec<OrchestratorError>,
}

impl RunReport {
    pub fn trace(&self) -> Vec<TraceEntry> {
        self.messages
            .iter()
            .map(|m| TraceEntry {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }

    pub fn reached_terminal(&self) -> bool {
        self.path.last() == Some(&NodeId::Terminal)
    }
}

/// 单次遍历的可变部分
struct Walk {
    ctx: RunContext,
    state: ConversationState,
    path: Vec<NodeId>,
    errors: Vec<OrchestratorError>,
}

impl Walk {
    fn report(self) -> RunReport {
        let step_count = self.state.step_count();
        let intent_flags = self.state.intent_flags();
        RunReport {
            run_id: self.ctx.run_id,
            messages: self.state.into_messages(),
            path: self.path,
            step_count,
            intent_flags,
            errors: self.errors,
        }
    }

    fn abort(mut self, error: OrchestratorError) -> RunAborted {
        tracing::error!(
            run_id = %self.ctx.run_id,
            step = self.state.step_count(),
            kind = error.kind(),
            error = %error,
            "invocation aborted"
        );
        let note = Message::error_note(error.kind(), &error);
        self.state = merge(self.state, StateUpdate::messages(vec![note]));
        RunAborted {
            error,
            report: self.report(),
        }
    }
}

pub struct GraphExecutor {
    classifier: Arc<dyn GraphNode>,
    author: Arc<dyn GraphNode>,
    publisher: Arc<dyn GraphNode>,
    max_steps: usize,
}

impl GraphExecutor {
    pub fn new(
        classifier: Arc<dyn GraphNode>,
        author: Arc<dyn GraphNode>,
        publisher: Arc<dyn GraphNode>,
        max_steps: usize,
    ) -> Self {
        Self {
            classifier,
            author,
            publisher,
            max_steps,
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    fn node(&self, id: NodeId) -> Option<&Arc<dyn GraphNode>> {
        match id {
            NodeId::Classify => Some(&self.classifier),
            NodeId::Author => Some(&self.author),
            NodeId::Publish => Some(&self.publisher),
            NodeId::Start | NodeId::Terminal => None,
        }
    }

    /// 执行一条指令直至 Terminal 或致命错误
    pub async fn invoke(&self, instruction: &str) -> Result<RunReport, RunAborted> {
        self.invoke_with_cancel(instruction, CancellationToken::new())
            .await
    }

    /// 同 invoke，额外在节点之间检查取消
    pub async fn invoke_with_cancel(
        &self,
        instruction: &str,
        cancel: CancellationToken,
    ) -> Result<RunReport, RunAborted> {
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(run_id = %run_id, max_steps = self.max_steps, "invocation started");

        let mut walk = Walk {
            ctx: RunContext::new(run_id),
            state: ConversationState::seed(instruction),
            path: Vec::new(),
            errors: Vec::new(),
        };
        let mut current = NodeId::Start;

        loop {
            let flags = walk.state.intent_flags();
            let next = next_node(current, &flags);
            if current == NodeId::Classify {
                tracing::info!(
                    run_id = %walk.ctx.run_id,
                    route = ?route(&flags),
                    next = %next,
                    "route selected"
                );
            }

            if next == NodeId::Terminal {
                walk.path.push(NodeId::Terminal);
                let report = walk.report();
                tracing::info!(
                    run_id = %report.run_id,
                    steps = report.step_count,
                    messages = report.messages.len(),
                    non_fatal_errors = report.errors.len(),
                    "invocation finished"
                );
                return Ok(report);
            }

            if cancel.is_cancelled() {
                return Err(walk.abort(OrchestratorError::Cancelled));
            }

            walk.state = walk.state.advance_step();
            let step = walk.state.step_count();
            if step > self.max_steps {
                let limit = self.max_steps;
                return Err(walk.abort(OrchestratorError::RecursionLimitExceeded { limit }));
            }

            let Some(node) = self.node(next).cloned() else {
                return Err(walk.abort(OrchestratorError::Configuration(format!(
                    "no node bound for {next}"
                ))));
            };
            walk.path.push(next);
            tracing::info!(run_id = %walk.ctx.run_id, node = %next, step, "node entered");

            match node.run(&walk.state, &walk.ctx).await {
                Ok(update) => {
                    tracing::info!(
                        run_id = %walk.ctx.run_id,
                        node = %next,
                        step,
                        new_messages = update.new_messages.len(),
                        "node completed"
                    );
                    walk.state = merge(walk.state, update);
                }
                Err(failure) => {
                    walk.state = merge(walk.state, failure.partial);
                    if failure.error.is_fatal() {
                        return Err(walk.abort(failure.error));
                    }
                    tracing::warn!(
                        run_id = %walk.ctx.run_id,
                        node = %next,
                        step,
                        error = %failure.error,
                        "node failed, continuing along fixed edge"
                    );
                    let note = Message::error_note(failure.error.kind(), &failure.error);
                    walk.state = merge(walk.state, StateUpdate::messages(vec![note]));
                    walk.errors.push(failure.error);
                }
            }
            current = next;
        }
    }
}
