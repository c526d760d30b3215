//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）与有界重试

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::{MockLlmClient, MOCK_FALLBACK_REPLY};
pub use openai::{OpenAiClient, GEMINI_OPENAI_BASE_URL, OPENAI_BASE_URL};
pub use traits::{
    CompletionRequest, LlmClient, LlmError, LlmResponse, OutputSchema, RetryConfig,
    RetryingLlmClient, ToolCall, ToolSpec,
};
