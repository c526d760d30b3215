//! 编排图：类型、路由、执行器与构建器

pub mod builder;
pub mod engine;
pub mod graph;
pub mod types;

pub use builder::OrchestratorBuilder;
pub use engine::{GraphExecutor, RunReport, TraceEntry, DEFAULT_MAX_STEPS};
pub use graph::{next_node, route, Route};
pub use types::*;
