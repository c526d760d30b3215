//! Mock 发布后端（测试 / dry-run）
//!
//! 按幂等键去重、记录真实「上线」的帖子、统计并发中的调用数，并可预置下一次调用的失败。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::publish::{PostReceipt, PublishError, Publisher};

#[derive(Debug, Default)]
struct MockState {
    by_key: HashMap<String, PostReceipt>,
    live: Vec<(String, String)>,
    failures: VecDeque<PublishError>,
}

#[derive(Debug, Default)]
pub struct MockPublisher {
    state: Mutex<MockState>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 下一次调用返回该错误（可多次排队）
    pub fn fail_next(&self, err: PublishError) {
        self.lock().failures.push_back(err);
    }

    /// 已上线的帖子：(text, post_id)
    pub fn live_posts(&self) -> Vec<(String, String)> {
        self.lock().live.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 观察到的最大并发调用数
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, text: &str, idempotency_key: &str) -> Result<PostReceipt, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut state = self.lock();
            if let Some(err) = state.failures.pop_front() {
                Err(err)
            } else if let Some(existing) = state.by_key.get(idempotency_key) {
                Ok(existing.clone())
            } else {
                let receipt = PostReceipt::new(format!("mock-{}", state.live.len() + 1));
                state
                    .by_key
                    .insert(idempotency_key.to_string(), receipt.clone());
                state.live.push((text.to_string(), receipt.post_id.clone()));
                Ok(receipt)
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_repeated_key_returns_original_post() {
        let publisher = MockPublisher::new();
        let a = publisher.publish("hello", "key-1").await.unwrap();
        let b = publisher.publish("hello", "key-1").await.unwrap();
        assert_eq!(a.post_id, b.post_id);
        assert_eq!(publisher.live_posts().len(), 1);
        assert_eq!(publisher.call_count(), 2);
    }
}
