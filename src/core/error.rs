//! 编排器错误类型
//!
//! 除 Authoring 以外的错误都是致命的：当前调用立即终止，但部分轨迹仍然返回给调用方。
//! Authoring 失败只写入轨迹，流程沿固定边继续进入发布节点。

use thiserror::Error;

use crate::llm::LlmError;
use crate::workflow::{NodeId, RunReport};

/// 编排过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    /// 分类器输出不符合 schema（未发生任何副作用）
    #[error("Classifier output failed schema validation: {0}")]
    ClassificationSchema(String),

    /// 节点内的 LLM 调用失败（瞬时错误已按重试策略耗尽，或为不可重试错误）
    #[error("LLM call failed in {node} node: {source}")]
    Llm {
        node: NodeId,
        #[source]
        source: LlmError,
    },

    #[error("Authoring failed: {0}")]
    Authoring(String),

    #[error("Recursion limit of {limit} steps exceeded")]
    RecursionLimitExceeded { limit: usize },

    #[error("Publish tool-call budget of {budget} exceeded")]
    PublishRecursionExceeded { budget: usize },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invocation cancelled")]
    Cancelled,
}

impl OrchestratorError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, OrchestratorError::Authoring(_))
    }

    /// 写入轨迹时使用的错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::ClassificationSchema(_) => "classification_schema_error",
            OrchestratorError::Llm { source, .. } if source.is_transient() => "llm_transient_error",
            OrchestratorError::Llm { .. } => "llm_error",
            OrchestratorError::Authoring(_) => "authoring_error",
            OrchestratorError::RecursionLimitExceeded { .. } => "recursion_limit_exceeded",
            OrchestratorError::PublishRecursionExceeded { .. } => "publish_recursion_exceeded",
            OrchestratorError::Configuration(_) => "configuration_error",
            OrchestratorError::Cancelled => "cancelled",
        }
    }
}

/// 致命错误中止一次调用；仍携带截至中止时的部分轨迹
#[derive(Error, Debug, Clone)]
#[error("invocation {} aborted: {}", .report.run_id, .error)]
pub struct RunAborted {
    #[source]
    pub error: OrchestratorError,
    pub report: RunReport,
}
