//! Mock 链上查询：固定数据 + 调用计数

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::chain::{ChainQuery, QueryError};

#[derive(Debug, Default)]
pub struct MockChainQuery {
    fixtures: HashMap<String, Value>,
    calls: AtomicUsize,
}

impl MockChainQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixture(mut self, resource: &str, data: Value) -> Self {
        self.fixtures.insert(resource.to_string(), data);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainQuery for MockChainQuery {
    async fn query(&self, resource: &str) -> Result<Value, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fixtures
            .get(resource)
            .cloned()
            .ok_or_else(|| QueryError::NotFound(resource.to_string()))
    }
}
