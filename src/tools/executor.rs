//! 工具执行器
//!
//! 持有 ToolRegistry 与单次调用超时，execute(tool_name, args) 在超时内调用工具，
//! 超时或失败时转为 ToolError（Timeout / Failed / UnknownTool）；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::timeout;

use crate::llm::ToolSpec;
use crate::tools::ToolRegistry;

/// 工具调用错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool timeout: {0}")]
    Timeout(String),

    #[error("{message}")]
    Failed { kind: &'static str, message: String },
}

impl ToolError {
    /// 写入轨迹 metadata.error 的类别
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Timeout(_) => "tool_timeout",
            ToolError::Failed { kind, .. } => *kind,
        }
    }
}

/// 工具执行器：对每次调用施加超时，并将结果映射为 ToolError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// 执行指定工具；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, args: serde_json::Value) -> Result<String, ToolError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, tool.execute(args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(message)) => Err(ToolError::Failed {
                kind: tool.error_kind(),
                message,
            }),
            Err(_) => Err(ToolError::Timeout(tool_name.to_string())),
        }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok("done".to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        fn error_kind(&self) -> &'static str {
            "publish_error"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Err("nope".to_string())
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        registry.register(FailingTool);
        ToolExecutor::new(registry, Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let err = executor().execute("slow", json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::Timeout("slow".to_string()));
        assert_eq!(err.kind(), "tool_timeout");
    }

    #[tokio::test]
    async fn test_failure_carries_tool_error_kind() {
        let err = executor().execute("failing", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "publish_error");
        assert_eq!(err.to_string(), "nope");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = executor().execute("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[test]
    fn test_specs_are_sorted() {
        let names: Vec<String> = executor().specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["failing".to_string(), "slow".to_string()]);
    }
}
