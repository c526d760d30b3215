//! 发布闸门：单账号串行化 + 幂等键去重
//!
//! 整个进程共享一个 PublishGate（Arc）。publish 持有异步互斥锁直到后端返回，
//! 因此来自不同编排调用的发布请求不会交错；成功回执按幂等键缓存，重复键直接返回原回执。
//! 失败不缓存，同一键可以在瞬时错误后重试。
//! 回执缓存有容量上限，超出时按插入顺序淘汰最早的键；幂等键每次调用唯一，旧键不会再被使用。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::publish::{PostReceipt, PublishError, Publisher};

/// 回执缓存默认容量
pub const DEFAULT_RECEIPT_CAPACITY: usize = 1024;

/// 按插入顺序淘汰的有界回执缓存
#[derive(Debug)]
struct ReceiptCache {
    entries: HashMap<String, PostReceipt>,
    order: VecDeque<String>,
    capacity: usize,
}

impl ReceiptCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, key: &str) -> Option<&PostReceipt> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: &str, receipt: PostReceipt) {
        if self.entries.insert(key.to_string(), receipt).is_none() {
            self.order.push_back(key.to_string());
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                tracing::debug!(idempotency_key = %oldest, "receipt evicted");
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct PublishGate {
    inner: Arc<dyn Publisher>,
    receipts: Mutex<ReceiptCache>,
}

impl PublishGate {
    pub fn new(inner: Arc<dyn Publisher>) -> Self {
        Self::with_receipt_capacity(inner, DEFAULT_RECEIPT_CAPACITY)
    }

    /// 指定回执缓存容量（最小为 1）
    pub fn with_receipt_capacity(inner: Arc<dyn Publisher>, capacity: usize) -> Self {
        Self {
            inner,
            receipts: Mutex::new(ReceiptCache::new(capacity)),
        }
    }
}

#[async_trait]
impl Publisher for PublishGate {
    async fn publish(&self, text: &str, idempotency_key: &str) -> Result<PostReceipt, PublishError> {
        let mut receipts = self.receipts.lock().await;
        if let Some(existing) = receipts.get(idempotency_key) {
            tracing::info!(
                idempotency_key,
                post_id = %existing.post_id,
                "duplicate publish suppressed"
            );
            return Ok(existing.clone());
        }

        let receipt = self.inner.publish(text, idempotency_key).await?;
        tracing::info!(idempotency_key, post_id = %receipt.post_id, "post published");
        receipts.insert(idempotency_key, receipt.clone());
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::MockPublisher;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_publishes_once() {
        let backend = Arc::new(MockPublisher::new());
        let gate = PublishGate::new(backend.clone());

        let first = gate.publish("gm", "publish-run-1").await.unwrap();
        let second = gate.publish("gm again", "publish-run-1").await.unwrap();

        assert_eq!(first.post_id, second.post_id);
        assert_eq!(backend.live_posts().len(), 1);
        assert_eq!(gate.receipts.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_receipt_cache_is_bounded() {
        let backend = Arc::new(MockPublisher::new());
        let gate = PublishGate::with_receipt_capacity(backend.clone(), 2);

        for key in ["a", "b", "c"] {
            gate.publish("gm", key).await.unwrap();
        }
        assert_eq!(gate.receipts.lock().await.len(), 2);
        assert_eq!(backend.call_count(), 3);

        // 最新的键仍由闸门直接应答
        gate.publish("gm", "c").await.unwrap();
        assert_eq!(backend.call_count(), 3);

        // 被淘汰的最早键重新到达后端
        gate.publish("gm", "a").await.unwrap();
        assert_eq!(backend.call_count(), 4);
        assert_eq!(backend.live_posts().len(), 3);
        assert_eq!(gate.receipts.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let backend = Arc::new(MockPublisher::new());
        backend.fail_next(PublishError::Timeout);
        let gate = PublishGate::new(backend.clone());

        assert_eq!(
            gate.publish("gm", "k").await.unwrap_err(),
            PublishError::Timeout
        );
        let receipt = gate.publish("gm", "k").await.unwrap();
        assert_eq!(backend.live_posts(), vec![("gm".to_string(), receipt.post_id)]);
    }

    #[tokio::test]
    async fn test_concurrent_publishes_are_serialized() {
        let backend = Arc::new(MockPublisher::new().with_delay(Duration::from_millis(20)));
        let gate = Arc::new(PublishGate::new(backend.clone()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.publish("post", &format!("key-{i}")).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(backend.live_posts().len(), 4);
        assert_eq!(backend.max_in_flight(), 1);
    }
}
