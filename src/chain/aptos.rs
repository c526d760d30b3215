//! Aptos 全节点 REST 查询
//!
//! 资源标识格式：
//! - `ledger`：链信息（GET /v1）
//! - `account/<addr>`：账户信息
//! - `resources/<addr>`：账户下所有资源
//! - `resource/<addr>/<move_type>`：单个资源，如 `resource/0x1/0x1::coin::CoinInfo<0x1::aptos_coin::AptosCoin>`

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::chain::{ChainQuery, QueryError};

pub const APTOS_DEVNET_URL: &str = "https://fullnode.devnet.aptoslabs.com";

/// Aptos REST 客户端
pub struct AptosChainClient {
    http: reqwest::Client,
    node_url: String,
    timeout: Duration,
}

impl AptosChainClient {
    pub fn new(node_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            node_url: node_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }
}

fn is_address(s: &str) -> bool {
    let hex = s.strip_prefix("0x").unwrap_or("");
    !hex.is_empty() && hex.len() <= 64 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// 资源标识 -> REST 路径
pub fn resource_path(resource: &str) -> Result<String, QueryError> {
    let resource = resource.trim();
    if resource == "ledger" {
        return Ok("/v1".to_string());
    }

    let invalid = || QueryError::InvalidResource(resource.to_string());
    let (kind, rest) = resource.split_once('/').ok_or_else(invalid)?;
    match kind {
        "account" if is_address(rest) => Ok(format!("/v1/accounts/{rest}")),
        "resources" if is_address(rest) => Ok(format!("/v1/accounts/{rest}/resources")),
        "resource" => {
            let (addr, move_type) = rest.split_once('/').ok_or_else(invalid)?;
            if !is_address(addr) || !move_type.contains("::") {
                return Err(invalid());
            }
            Ok(format!("/v1/accounts/{addr}/resource/{move_type}"))
        }
        _ => Err(invalid()),
    }
}

#[async_trait]
impl ChainQuery for AptosChainClient {
    async fn query(&self, resource: &str) -> Result<Value, QueryError> {
        let path = resource_path(resource)?;
        tracing::debug!(resource, path = %path, "aptos query");

        let response = self
            .http
            .get(format!("{}{}", self.node_url, path))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QueryError::Timeout
                } else {
                    QueryError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(QueryError::NotFound(resource.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(QueryError::Api(format!("{status}: {text}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| QueryError::Api(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_paths() {
        assert_eq!(resource_path("ledger").unwrap(), "/v1");
        assert_eq!(resource_path("account/0x1").unwrap(), "/v1/accounts/0x1");
        assert_eq!(
            resource_path("resources/0xabc").unwrap(),
            "/v1/accounts/0xabc/resources"
        );
        assert_eq!(
            resource_path("resource/0x1/0x1::coin::CoinInfo<0x1::aptos_coin::AptosCoin>").unwrap(),
            "/v1/accounts/0x1/resource/0x1::coin::CoinInfo<0x1::aptos_coin::AptosCoin>"
        );
    }

    #[test]
    fn test_invalid_resources_are_rejected() {
        for bad in ["", "account/", "account/xyz", "resource/0x1/notatype", "blocks/1"] {
            assert!(
                matches!(resource_path(bad), Err(QueryError::InvalidResource(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = AptosChainClient::new("https://node.example/", Duration::from_secs(1));
        assert_eq!(client.node_url(), "https://node.example");
    }
}
