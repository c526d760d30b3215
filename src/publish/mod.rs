//! 内容发布能力（外部协作者）
//!
//! 所有发布动作都落在同一个社交账号上，因此并发调用必须串行化，且同一幂等键只能产生一条帖子。
//! 具体后端（X / Mock）实现 Publisher；PublishGate 负责串行化与幂等去重，编排器只持有 PublishGate。

pub mod gate;
pub mod mock;
pub mod x;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gate::{PublishGate, DEFAULT_RECEIPT_CAPACITY};
pub use mock::MockPublisher;
pub use x::{XPublisher, X_API_BASE, X_MAX_POST_CHARS};

/// 发布成功的回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostReceipt {
    pub post_id: String,
    /// 发布时间（毫秒时间戳）
    pub published_at: i64,
}

impl PostReceipt {
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            published_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// 发布错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("Post rejected: {0}")]
    Rejected(String),

    #[error("Publishing unauthorized: {0}")]
    Unauthorized(String),

    #[error("Publishing rate limited")]
    RateLimited,

    #[error("Publish request timed out")]
    Timeout,

    #[error("Publish network error: {0}")]
    Network(String),
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PublishError::RateLimited | PublishError::Timeout | PublishError::Network(_)
        )
    }
}

/// 发布能力：同一 idempotency_key 的重复调用必须返回首次的回执而不是再发一条
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str, idempotency_key: &str) -> Result<PostReceipt, PublishError>;
}
