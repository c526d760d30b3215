//! Xecutor - 单指令驱动的任务路由编排器
//!
//! 模块划分：
//! - **chain**: 链上只读查询能力（Aptos REST / Mock）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）与有界重试
//! - **memory**: 消息与角色
//! - **nodes**: 图节点（分类、撰写、发布）与有界工具调用循环
//! - **observability**: 日志初始化
//! - **publish**: 社交发布能力（X / Mock）与幂等串行门
//! - **tools**: 工具 trait、注册表与带超时的执行器
//! - **workflow**: 状态、路由、执行器与构建器

pub mod chain;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod nodes;
pub mod observability;
pub mod publish;
pub mod tools;
pub mod workflow;

pub use crate::core::{OrchestratorError, RunAborted};
pub use workflow::{GraphExecutor, OrchestratorBuilder, RunReport};
