//! 对话消息：编排过程中唯一的记录单元
//!
//! 消息一旦追加到 ConversationState 即不可变；metadata 携带工具调用 ID、错误标记等附加信息，
//! 由 LLM 客户端在转换为 API 格式时读取。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::ToolCall;

/// metadata 键：assistant 消息请求的工具调用列表
pub const META_TOOL_CALLS: &str = "tool_calls";
/// metadata 键：tool 消息对应的调用 ID
pub const META_TOOL_CALL_ID: &str = "tool_call_id";
/// metadata 键：tool 消息对应的工具名
pub const META_TOOL_NAME: &str = "tool_name";
/// metadata 键：错误消息标记（值为错误类别）
pub const META_ERROR: &str = "error";
/// metadata 键：意图歧义提示
pub const META_INTENT_WARNING: &str = "intent_warning";

/// 消息角色
///
/// System 只用于拼装发给模型的提示词，不会进入 ConversationState。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Assistant,
    Tool,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// 工具结果消息，关联到发起它的调用
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
            .with_meta(META_TOOL_CALL_ID, Value::String(call.id.clone()))
            .with_meta(META_TOOL_NAME, Value::String(call.name.clone()))
    }

    /// 工具失败消息：仍然是 tool 角色（模型需要看到失败原因），并带 error 标记
    pub fn tool_error(call: &ToolCall, kind: &str, reason: impl std::fmt::Display) -> Self {
        Self::tool_result(call, format!("Error: {reason}"))
            .with_meta(META_ERROR, Value::String(kind.to_string()))
    }

    /// assistant 发起的工具调用请求（content 可为空）
    pub fn assistant_tool_calls(content: impl Into<String>, calls: &[ToolCall]) -> Self {
        let calls = serde_json::to_value(calls).unwrap_or(Value::Array(Vec::new()));
        Self::assistant(content).with_meta(META_TOOL_CALLS, calls)
    }

    /// 节点级错误记录（非工具错误），以 assistant 角色写入轨迹
    pub fn error_note(kind: &str, reason: impl std::fmt::Display) -> Self {
        Self::assistant(format!("[{kind}] {reason}"))
            .with_meta(META_ERROR, Value::String(kind.to_string()))
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// 读取 assistant 消息中记录的工具调用
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.metadata
            .get(META_TOOL_CALLS)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        self.metadata.get(META_TOOL_CALL_ID).and_then(|v| v.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.metadata.contains_key(META_ERROR)
    }
}
