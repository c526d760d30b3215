//! 编排器构建器
//!
//! 把模型、链上查询、发布三个外部能力装配成 GraphExecutor。
//! 发布能力总是包在一个 PublishGate 后面，同一执行器的所有并发调用共享它。
//! 缺少模型或发布能力（或非 mock 后端缺少凭证）在接受任何调用之前就报 Configuration 错误。

use std::sync::Arc;
use std::time::Duration;

use crate::chain::{AptosChainClient, ChainQuery, MockChainQuery};
use crate::config::{AppConfig, ChainProvider, LlmProvider, PublishProvider};
use crate::core::OrchestratorError;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient, RetryConfig, RetryingLlmClient};
use crate::nodes::{AuthoringNode, ClassifierNode, PublishingNode};
use crate::publish::{
    MockPublisher, PublishGate, Publisher, XPublisher, DEFAULT_RECEIPT_CAPACITY,
};
use crate::workflow::engine::{GraphExecutor, DEFAULT_MAX_STEPS};

const DEFAULT_AUTHOR_TOOL_BUDGET: usize = 3;
const DEFAULT_PUBLISH_TOOL_BUDGET: usize = 5;
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(45);

/// 编排器构建器
pub struct OrchestratorBuilder {
    llm: Option<Arc<dyn LlmClient>>,
    retry: Option<RetryConfig>,
    chain: Option<Arc<dyn ChainQuery>>,
    publisher: Option<Arc<dyn Publisher>>,
    max_steps: usize,
    author_tool_budget: usize,
    publish_tool_budget: usize,
    tool_timeout: Duration,
    receipt_cache_size: usize,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            retry: None,
            chain: None,
            publisher: None,
            max_steps: DEFAULT_MAX_STEPS,
            author_tool_budget: DEFAULT_AUTHOR_TOOL_BUDGET,
            publish_tool_budget: DEFAULT_PUBLISH_TOOL_BUDGET,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            receipt_cache_size: DEFAULT_RECEIPT_CAPACITY,
        }
    }

    /// 按配置装配三个外部能力
    pub fn from_config(cfg: &AppConfig) -> Result<Self, OrchestratorError> {
        let llm: Arc<dyn LlmClient> = match cfg.llm.provider {
            LlmProvider::Mock => Arc::new(MockLlmClient::new()),
            provider => {
                let api_key = cfg.llm.resolved_api_key().ok_or_else(|| {
                    OrchestratorError::Configuration(format!(
                        "missing API key for LLM provider {provider:?} (set llm.api_key or the provider's env var)"
                    ))
                })?;
                Arc::new(OpenAiClient::new(
                    &cfg.llm.resolved_base_url(),
                    &cfg.llm.model,
                    &api_key,
                    Duration::from_secs(cfg.llm.request_timeout_secs),
                ))
            }
        };

        let chain: Arc<dyn ChainQuery> = match cfg.chain.provider {
            ChainProvider::Mock => Arc::new(MockChainQuery::new()),
            ChainProvider::Aptos => Arc::new(AptosChainClient::new(
                &cfg.chain.node_url,
                Duration::from_secs(cfg.chain.timeout_secs),
            )),
        };

        let publisher: Arc<dyn Publisher> = match cfg.publish.provider {
            PublishProvider::Mock => Arc::new(MockPublisher::new()),
            PublishProvider::X => {
                let token = cfg.publish.resolved_bearer_token().ok_or_else(|| {
                    OrchestratorError::Configuration(
                        "missing X bearer token (set publish.bearer_token or X_BEARER_TOKEN)"
                            .to_string(),
                    )
                })?;
                Arc::new(XPublisher::new(
                    &cfg.publish.api_base,
                    &token,
                    Duration::from_secs(cfg.publish.timeout_secs),
                ))
            }
        };

        tracing::info!(
            llm = ?cfg.llm.provider,
            model = %cfg.llm.model,
            chain = ?cfg.chain.provider,
            publish = ?cfg.publish.provider,
            "capabilities configured"
        );

        Ok(Self::new()
            .llm(llm)
            .retry(cfg.llm.retry_config())
            .chain(chain)
            .publisher(publisher)
            .max_steps(cfg.workflow.max_steps)
            .author_tool_budget(cfg.workflow.author_tool_budget)
            .publish_tool_budget(cfg.workflow.publish_tool_budget)
            .tool_timeout(Duration::from_secs(cfg.workflow.tool_timeout_secs))
            .receipt_cache_size(cfg.publish.receipt_cache_size))
    }

    pub fn llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 设置后模型调用包在 RetryingLlmClient 里；未设置则直接使用原客户端
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn chain(mut self, chain: Arc<dyn ChainQuery>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn author_tool_budget(mut self, budget: usize) -> Self {
        self.author_tool_budget = budget;
        self
    }

    pub fn publish_tool_budget(mut self, budget: usize) -> Self {
        self.publish_tool_budget = budget;
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// 发布闸门的回执缓存容量
    pub fn receipt_cache_size(mut self, size: usize) -> Self {
        self.receipt_cache_size = size;
        self
    }

    pub fn build(self) -> Result<GraphExecutor, OrchestratorError> {
        let llm = self.llm.ok_or_else(|| {
            OrchestratorError::Configuration("no language-model capability configured".to_string())
        })?;
        let publisher = self.publisher.ok_or_else(|| {
            OrchestratorError::Configuration("no publishing capability configured".to_string())
        })?;
        if self.max_steps == 0 {
            return Err(OrchestratorError::Configuration(
                "max_steps must be at least 1".to_string(),
            ));
        }

        let llm: Arc<dyn LlmClient> = match self.retry {
            Some(retry) => Arc::new(RetryingLlmClient::new(llm, retry)),
            None => llm,
        };
        let gate: Arc<dyn Publisher> = Arc::new(PublishGate::with_receipt_capacity(
            publisher,
            self.receipt_cache_size,
        ));

        let classifier = Arc::new(ClassifierNode::new(llm.clone()));
        let mut author = AuthoringNode::new(llm.clone(), self.author_tool_budget, self.tool_timeout);
        if let Some(chain) = self.chain {
            author = author.with_chain(chain);
        }
        let publishing =
            PublishingNode::new(llm, gate, self.publish_tool_budget, self.tool_timeout);

        Ok(GraphExecutor::new(
            classifier,
            Arc::new(author),
            Arc::new(publishing),
            self.max_steps,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmSection, PublishSection};

    fn mock_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = LlmProvider::Mock;
        cfg.chain.provider = ChainProvider::Mock;
        cfg.publish.provider = PublishProvider::Mock;
        cfg
    }

    #[test]
    fn test_mock_config_builds() {
        let executor = OrchestratorBuilder::from_config(&mock_config())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(executor.max_steps(), 50);
    }

    #[test]
    fn test_missing_publisher_is_configuration_error() {
        let err = OrchestratorBuilder::new()
            .llm(Arc::new(MockLlmClient::new()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
    }

    #[test]
    fn test_x_without_token_is_configuration_error() {
        let mut cfg = mock_config();
        cfg.publish = PublishSection {
            provider: PublishProvider::X,
            bearer_token: Some(String::new()),
            ..PublishSection::default()
        };
        // 空 token 视为缺失（环境变量中若配置了真实 token 则跳过）
        if std::env::var("X_BEARER_TOKEN").is_ok() {
            return;
        }
        let err = OrchestratorBuilder::from_config(&cfg).err().unwrap();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
    }

    #[test]
    fn test_llm_with_explicit_key_builds() {
        let mut cfg = mock_config();
        cfg.llm = LlmSection {
            provider: LlmProvider::Openai,
            api_key: Some("sk-test".into()),
            ..LlmSection::default()
        };
        assert!(OrchestratorBuilder::from_config(&cfg).unwrap().build().is_ok());
    }

    #[test]
    fn test_zero_step_ceiling_rejected() {
        let err = OrchestratorBuilder::new()
            .llm(Arc::new(MockLlmClient::new()))
            .publisher(Arc::new(MockPublisher::new()))
            .max_steps(0)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
    }
}
