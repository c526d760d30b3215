//! 工具层：Tool trait、注册表、带超时与审计日志的执行器，以及链上查询与发布两个工具

pub mod chain_query;
pub mod executor;
pub mod publish;
pub mod registry;

pub use chain_query::{ChainQueryTool, CHAIN_QUERY_TOOL};
pub use executor::{ToolError, ToolExecutor};
pub use publish::{PublishTool, PUBLISH_TOOL};
pub use registry::{Tool, ToolRegistry};
