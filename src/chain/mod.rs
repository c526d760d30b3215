//! 链上只读查询能力（外部协作者）
//!
//! 编排器只通过 ChainQuery trait 读取链上数据；撰写节点把它作为可调用工具暴露给模型。
//! 查询彼此独立，不需要顺序保证。

pub mod aptos;
pub mod mock;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use aptos::{AptosChainClient, APTOS_DEVNET_URL};
pub use mock::MockChainQuery;

/// 链上查询错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Unknown resource identifier: {0}")]
    InvalidResource(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Chain query timed out")]
    Timeout,

    #[error("Chain network error: {0}")]
    Network(String),

    #[error("Chain API error: {0}")]
    Api(String),
}

/// 只读链上查询
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// 按资源标识读取结构化数据
    async fn query(&self, resource: &str) -> Result<Value, QueryError>;
}
