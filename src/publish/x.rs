//! X（Twitter）API v2 发布后端
//!
//! POST `{api_base}/2/tweets`，Bearer 为具备 tweet.write 权限的用户令牌。
//! X 本身不支持幂等键，去重由 PublishGate 负责；这里只做长度校验与状态码映射。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::publish::{PostReceipt, PublishError, Publisher};

pub const X_API_BASE: &str = "https://api.twitter.com";
pub const X_MAX_POST_CHARS: usize = 280;

pub struct XPublisher {
    http: reqwest::Client,
    api_base: String,
    bearer_token: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

impl XPublisher {
    pub fn new(api_base: &str, bearer_token: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.to_string(),
            timeout,
        }
    }
}

/// 发布前的文本校验：非空且不超过 280 字符
pub fn validate_post_text(text: &str) -> Result<(), PublishError> {
    let len = text.trim().chars().count();
    if len == 0 {
        return Err(PublishError::Rejected("post text is empty".to_string()));
    }
    if len > X_MAX_POST_CHARS {
        return Err(PublishError::Rejected(format!(
            "post text is {len} characters, limit is {X_MAX_POST_CHARS}"
        )));
    }
    Ok(())
}

#[async_trait]
impl Publisher for XPublisher {
    async fn publish(&self, text: &str, idempotency_key: &str) -> Result<PostReceipt, PublishError> {
        validate_post_text(text)?;
        tracing::debug!(idempotency_key, chars = text.chars().count(), "posting to X");

        let response = self
            .http
            .post(format!("{}/2/tweets", self.api_base))
            .bearer_auth(&self.bearer_token)
            .timeout(self.timeout)
            .json(&json!({ "text": text.trim() }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PublishError::Timeout
                } else {
                    PublishError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        match status.as_u16() {
            200 | 201 => {}
            401 | 403 => {
                let body = response.text().await.unwrap_or_default();
                return Err(PublishError::Unauthorized(body));
            }
            429 => return Err(PublishError::RateLimited),
            s if s >= 500 => return Err(PublishError::Network(format!("X returned {status}"))),
            _ => {
                let body = response.text().await.unwrap_or_default();
                return Err(PublishError::Rejected(format!("{status}: {body}")));
            }
        }

        let created: CreateTweetResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Network(format!("unreadable response: {e}")))?;
        Ok(PostReceipt::new(created.data.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_post_text() {
        assert!(validate_post_text("gm").is_ok());
        assert!(matches!(
            validate_post_text("   "),
            Err(PublishError::Rejected(_))
        ));
        let long = "a".repeat(X_MAX_POST_CHARS + 1);
        assert!(matches!(
            validate_post_text(&long),
            Err(PublishError::Rejected(_))
        ));
        let exact = "好".repeat(X_MAX_POST_CHARS);
        assert!(validate_post_text(&exact).is_ok());
    }
}
