//! 分类节点：把消息历史交给模型，要求输出符合 IntentFlags schema 的 JSON
//!
//! 解析失败（缺字段、类型不对、多余字段、非 JSON）一律是 ClassificationSchema 错误，不重试、不改状态。
//! 模型调用本身的瞬时错误由 RetryingLlmClient 在调用点重试，耗尽后作为本节点的 Llm 错误抛出。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::schema_for;

use crate::core::OrchestratorError;
use crate::llm::{CompletionRequest, LlmClient, OutputSchema};
use crate::memory::Message;
use crate::nodes::prompts::CLASSIFIER_PROMPT;
use crate::nodes::{GraphNode, NodeFailure, RunContext};
use crate::workflow::{ConversationState, IntentFlags, NodeId, StateUpdate};

const RAW_PREVIEW_CHARS: usize = 200;

/// 校验并解析模型输出；接受裸 JSON 或 ```json 代码块
pub fn parse_intent_flags(output: &str) -> Result<IntentFlags, OrchestratorError> {
    let trimmed = output.trim();
    let json_str = if let Some(start) = trimmed.find("```") {
        let rest = &trimmed[start + 3..];
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else {
        trimmed
    };

    serde_json::from_str::<IntentFlags>(json_str).map_err(|e| {
        let preview: String = json_str.chars().take(RAW_PREVIEW_CHARS).collect();
        OrchestratorError::ClassificationSchema(format!("{e}: {preview}"))
    })
}

/// IntentFlags 的结构化输出约束；渲染失败直接报错，不发送无约束的请求
pub fn intent_schema() -> Result<OutputSchema, OrchestratorError> {
    let schema = serde_json::to_value(schema_for!(IntentFlags)).map_err(|e| {
        OrchestratorError::ClassificationSchema(format!("failed to render intent schema: {e}"))
    })?;
    Ok(OutputSchema {
        name: "intent_flags".to_string(),
        schema,
    })
}

pub struct ClassifierNode {
    llm: Arc<dyn LlmClient>,
}

impl ClassifierNode {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn system_prompt(schema: &OutputSchema) -> Result<String, OrchestratorError> {
        let rendered = serde_json::to_string_pretty(&schema.schema).map_err(|e| {
            OrchestratorError::ClassificationSchema(format!("failed to render intent schema: {e}"))
        })?;
        Ok(CLASSIFIER_PROMPT.replace("{format_instructions}", &rendered))
    }
}

#[async_trait]
impl GraphNode for ClassifierNode {
    async fn run(
        &self,
        state: &ConversationState,
        _ctx: &RunContext,
    ) -> Result<StateUpdate, NodeFailure> {
        let schema = intent_schema()?;
        let mut messages = vec![Message::system(Self::system_prompt(&schema)?)];
        messages.extend_from_slice(state.messages());
        let request = CompletionRequest::new(messages).with_output_schema(schema);

        let response = self
            .llm
            .complete(&request)
            .await
            .map_err(|source| OrchestratorError::Llm {
                node: NodeId::Classify,
                source,
            })?;

        if response.is_tool_call() {
            return Err(OrchestratorError::ClassificationSchema(
                "expected a JSON object, model requested a tool call".to_string(),
            )
            .into());
        }

        let flags = parse_intent_flags(&response.content)?;
        tracing::info!(
            is_read_query = flags.is_read_query,
            is_writer_query = flags.is_writer_query,
            is_post_query = flags.is_post_query,
            "intent classified"
        );
        Ok(StateUpdate::flags(flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};

    #[test]
    fn test_parse_bare_and_fenced_json() {
        let bare = r#"{"isReadQuery": false, "isWriterQuery": true, "isPostQuery": true}"#;
        assert_eq!(
            parse_intent_flags(bare).unwrap(),
            IntentFlags::new(false, true, true)
        );

        let fenced = "```json\n{\"isReadQuery\": true, \"isWriterQuery\": false, \"isPostQuery\": false}\n```";
        assert_eq!(
            parse_intent_flags(fenced).unwrap(),
            IntentFlags::new(true, false, false)
        );
    }

    #[test]
    fn test_parse_rejects_invalid_shapes() {
        let cases = [
            "not json at all",
            r#"{"isReadQuery": false, "isWriterQuery": true}"#,
            r#"{"isReadQuery": "no", "isWriterQuery": true, "isPostQuery": false}"#,
            r#"{"isReadQuery": false, "isWriterQuery": true, "isPostQuery": false, "extra": 1}"#,
        ];
        for case in cases {
            assert!(
                matches!(
                    parse_intent_flags(case),
                    Err(OrchestratorError::ClassificationSchema(_))
                ),
                "{case} should fail validation"
            );
        }
    }

    #[test]
    fn test_intent_schema_requires_every_flag() {
        let schema = intent_schema().unwrap();
        assert_eq!(schema.schema["type"], "object");
        let required: Vec<&str> = schema.schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        for field in ["isReadQuery", "isWriterQuery", "isPostQuery"] {
            assert!(required.contains(&field), "{field} missing from required");
        }

        let prompt = ClassifierNode::system_prompt(&schema).unwrap();
        assert!(!prompt.contains("{format_instructions}"));
        assert!(prompt.contains("\"required\""));
    }

    #[tokio::test]
    async fn test_request_carries_schema_and_history() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_text(r#"{"isReadQuery": false, "isWriterQuery": false, "isPostQuery": true}"#);
        let node = ClassifierNode::new(llm.clone());
        let state = ConversationState::seed("post gm");

        let update = node.run(&state, &RunContext::new("t")).await.unwrap();
        assert_eq!(update.intent_flags, Some(IntentFlags::new(false, false, true)));
        assert!(update.new_messages.is_empty());

        let request = &llm.requests()[0];
        let schema = request.output_schema.as_ref().unwrap();
        assert_eq!(schema.name, "intent_flags");
        assert!(request.messages[0].content.contains("isWriterQuery"));
        assert_eq!(request.messages[1].content, "post gm");
        assert!(request.tools.is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_is_classify_error() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_error(LlmError::ApiError("invalid key".into()));
        let node = ClassifierNode::new(llm);

        let failure = node
            .run(&ConversationState::seed("x"), &RunContext::new("t"))
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error,
            OrchestratorError::Llm {
                node: NodeId::Classify,
                ..
            }
        ));
        assert_eq!(failure.partial, StateUpdate::default());
    }
}
