//! 编排图拓扑
//!
//! 固定边：Start -> Classify，Author -> Publish，Publish -> Terminal；
//! 唯一的条件边是 Classify 之后，由 route 根据意图标志决定。

use serde::Serialize;

use crate::workflow::types::{IntentFlags, NodeId};

/// 分类之后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Route {
    Authoring,
    Publishing,
    Terminal,
}

/// 纯函数路由，优先级固定：isWriterQuery > isPostQuery > 结束。
/// isReadQuery 不参与路由（读节点分支未接入图）。
pub fn route(flags: &IntentFlags) -> Route {
    if flags.is_writer_query {
        Route::Authoring
    } else if flags.is_post_query {
        Route::Publishing
    } else {
        Route::Terminal
    }
}

/// 状态转移表
pub fn next_node(current: NodeId, flags: &IntentFlags) -> NodeId {
    match current {
        NodeId::Start => NodeId::Classify,
        NodeId::Classify => match route(flags) {
            Route::Authoring => NodeId::Author,
            Route::Publishing => NodeId::Publish,
            Route::Terminal => NodeId::Terminal,
        },
        NodeId::Author => NodeId::Publish,
        NodeId::Publish | NodeId::Terminal => NodeId::Terminal,
    }
}
