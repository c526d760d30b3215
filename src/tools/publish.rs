//! 发布工具：把 Publisher 能力暴露给发布节点的模型
//!
//! 每次编排调用新建一个 PublishTool，携带该调用的幂等键；模型重复或重试调用都复用同一个键。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::publish::Publisher;
use crate::tools::Tool;

pub const PUBLISH_TOOL: &str = "post_on_x_twitter";

pub struct PublishTool {
    publisher: Arc<dyn Publisher>,
    idempotency_key: String,
}

impl PublishTool {
    pub fn new(publisher: Arc<dyn Publisher>, idempotency_key: impl Into<String>) -> Self {
        Self {
            publisher,
            idempotency_key: idempotency_key.into(),
        }
    }
}

#[async_trait]
impl Tool for PublishTool {
    fn name(&self) -> &str {
        PUBLISH_TOOL
    }

    fn description(&self) -> &str {
        "Publish a post on X/Twitter from the configured account. Returns {\"postId\": ...}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The exact post text (at most 280 characters)"
                }
            },
            "required": ["text"]
        })
    }

    fn error_kind(&self) -> &'static str {
        "publish_error"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing required string argument 'text'".to_string())?;

        match self.publisher.publish(text, &self.idempotency_key).await {
            Ok(receipt) => serde_json::to_string(&receipt).map_err(|e| e.to_string()),
            Err(e) if e.is_transient() => Err(format!(
                "{e} (transient; calling the tool again with the same text is safe)"
            )),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::{MockPublisher, PublishError};
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_returns_post_id() {
        let backend = Arc::new(MockPublisher::new());
        let tool = PublishTool::new(backend.clone(), "publish-abc");

        let out = tool.execute(json!({"text": "gm"})).await.unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["postId"], "mock-1");
        assert_eq!(backend.live_posts().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_hints_retry() {
        let backend = Arc::new(MockPublisher::new());
        backend.fail_next(PublishError::RateLimited);
        let tool = PublishTool::new(backend, "publish-abc");

        let err = tool.execute(json!({"text": "gm"})).await.unwrap_err();
        assert!(err.contains("transient"));
    }
}
