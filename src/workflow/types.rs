//! 编排图类型定义
//!
//! 定义图节点、意图标志、会话状态，以及节点局部更新与纯函数 merge。
//! 状态只由执行器通过 merge 推进：消息只追加不重排，意图标志整体替换。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::memory::{Message, Role};

/// 图中的节点（状态机状态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeId {
    Start,
    Classify,
    Author,
    Publish,
    Terminal,
}

impl NodeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::Start => "Start",
            NodeId::Classify => "Classify",
            NodeId::Author => "Author",
            NodeId::Publish => "Publish",
            NodeId::Terminal => "Terminal",
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 分类器输出的意图标志（同时也是发给模型的结构化输出 schema）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IntentFlags {
    /// 需要读取链上数据
    #[schemars(description = "Query requires reading data from the Aptos blockchain")]
    pub is_read_query: bool,
    /// 需要撰写待发布内容
    #[schemars(description = "Query requires writing a tweet for tweeting on X/Twitter")]
    pub is_writer_query: bool,
    /// 需要发布到社交账号
    #[schemars(description = "Posts tweet on X/Twitter")]
    pub is_post_query: bool,
}

impl IntentFlags {
    pub fn new(is_read_query: bool, is_writer_query: bool, is_post_query: bool) -> Self {
        Self {
            is_read_query,
            is_writer_query,
            is_post_query,
        }
    }
}

/// 单次调用的会话状态，由执行器独占
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    messages: Vec<Message>,
    intent_flags: IntentFlags,
    step_count: usize,
}

impl ConversationState {
    /// 以唯一一条 human 消息作为初始状态
    pub fn seed(instruction: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::human(instruction)],
            intent_flags: IntentFlags::default(),
            step_count: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn intent_flags(&self) -> IntentFlags {
        self.intent_flags
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// 进入下一个节点：步数 +1
    pub fn advance_step(mut self) -> Self {
        self.step_count += 1;
        self
    }

    /// 轨迹中是否已有撰写出的正文（非工具请求、非错误记录的 assistant 消息）
    pub fn has_authored_content(&self) -> bool {
        self.messages.iter().any(|m| {
            m.role == Role::Assistant
                && !m.content.trim().is_empty()
                && !m.is_error()
                && m.tool_calls().is_empty()
        })
    }
}

/// 节点返回的局部更新
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// 追加到尾部的新消息
    pub new_messages: Vec<Message>,
    /// 若为 Some，整体替换意图标志
    pub intent_flags: Option<IntentFlags>,
}

impl StateUpdate {
    pub fn messages(new_messages: Vec<Message>) -> Self {
        Self {
            new_messages,
            intent_flags: None,
        }
    }

    pub fn flags(flags: IntentFlags) -> Self {
        Self {
            new_messages: Vec::new(),
            intent_flags: Some(flags),
        }
    }
}

/// 纯函数合并：旧状态 + 局部更新 -> 新状态
pub fn merge(previous: ConversationState, partial: StateUpdate) -> ConversationState {
    let ConversationState {
        mut messages,
        intent_flags,
        step_count,
    } = previous;
    messages.extend(partial.new_messages);
    ConversationState {
        messages,
        intent_flags: partial.intent_flags.unwrap_or(intent_flags),
        step_count,
    }
}
