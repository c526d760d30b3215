//! 消息层：编排轨迹中的 Message / Role

pub mod conversation;

pub use conversation::{
    Message, Role, META_ERROR, META_INTENT_WARNING, META_TOOL_CALLS, META_TOOL_CALL_ID,
    META_TOOL_NAME,
};
