//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `XECUTOR__*` 覆盖（双下划线表示嵌套，如 `XECUTOR__LLM__PROVIDER=openai`）。
//! 凭证可直接写在配置里，也可以沿用各服务约定的环境变量（GOOGLE_API_KEY / OPENAI_API_KEY / X_BEARER_TOKEN）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::chain::APTOS_DEVNET_URL;
use crate::llm::{RetryConfig, GEMINI_OPENAI_BASE_URL, OPENAI_BASE_URL};
use crate::publish::{DEFAULT_RECEIPT_CAPACITY, X_API_BASE};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub workflow: WorkflowSection,
    pub llm: LlmSection,
    pub chain: ChainSection,
    pub publish: PublishSection,
}

/// [workflow] 段：步数上限与节点内工具调用预算
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowSection {
    pub max_steps: usize,
    /// 撰写节点最多可发起的链上查询次数
    pub author_tool_budget: usize,
    /// 发布节点最多可发起的发布调用次数
    pub publish_tool_budget: usize,
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            max_steps: 50,
            author_tool_budget: 3,
            publish_tool_budget: 5,
            tool_timeout_secs: 45,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    Openai,
    Mock,
}

/// [llm] 段：后端选择、超时与重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: LlmProvider,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            model: "gemini-2.0-flash".to_string(),
            base_url: None,
            api_key: None,
            request_timeout_secs: 60,
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
        }
    }
}

impl LlmSection {
    pub fn resolved_base_url(&self) -> String {
        match (&self.base_url, self.provider) {
            (Some(url), _) if !url.trim().is_empty() => url.clone(),
            (_, LlmProvider::Openai) => OPENAI_BASE_URL.to_string(),
            _ => GEMINI_OPENAI_BASE_URL.to_string(),
        }
    }

    /// 配置中的 api_key 优先，否则读对应服务的环境变量
    pub fn resolved_api_key(&self) -> Option<String> {
        let env_name = match self.provider {
            LlmProvider::Gemini => "GOOGLE_API_KEY",
            LlmProvider::Openai => "OPENAI_API_KEY",
            LlmProvider::Mock => return None,
        };
        non_empty(self.api_key.clone()).or_else(|| non_empty(std::env::var(env_name).ok()))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainProvider {
    Aptos,
    Mock,
}

/// [chain] 段：链上只读查询
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    pub provider: ChainProvider,
    pub node_url: String,
    pub timeout_secs: u64,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            provider: ChainProvider::Aptos,
            node_url: APTOS_DEVNET_URL.to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishProvider {
    X,
    Mock,
}

/// [publish] 段：社交账号发布
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishSection {
    pub provider: PublishProvider,
    pub bearer_token: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
    /// 发布闸门最多保留的成功回执数
    pub receipt_cache_size: usize,
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            provider: PublishProvider::X,
            bearer_token: None,
            api_base: X_API_BASE.to_string(),
            timeout_secs: 30,
            receipt_cache_size: DEFAULT_RECEIPT_CAPACITY,
        }
    }
}

impl PublishSection {
    pub fn resolved_bearer_token(&self) -> Option<String> {
        non_empty(self.bearer_token.clone())
            .or_else(|| non_empty(std::env::var("X_BEARER_TOKEN").ok()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 从 config 目录加载配置，环境变量 XECUTOR__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 XECUTOR__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("XECUTOR")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
