use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::time::Instant;

use signalfire_core::Result;
use signalfire_domain::ports::{EventBroadcaster, EventQueue};

/// 内存FIFO队列
///
/// 与Redis列表实现语义一致的进程内替身，用于测试和嵌入式场景。
#[derive(Default)]
pub struct InMemoryEventQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl InMemoryEventQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventQueue for InMemoryEventQueue {
    async fn push(&self, payload: &str) -> Result<()> {
        self.items.lock().await.push_back(payload.to_string());
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            // 先登记通知再检查队列，避免错过push与检查之间的唤醒
            let notified = self.notify.notified();

            if let Some(payload) = self.items.lock().await.pop_front() {
                return Ok(Some(payload));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let _ = tokio::time::timeout(remaining, notified).await;
        }
    }

    async fn size(&self) -> Result<u64> {
        Ok(self.items.lock().await.len() as u64)
    }
}

/// 内存广播通道
///
/// tokio broadcast实现，无历史回放：订阅前发布的消息不可见。
pub struct InMemoryBroadcaster {
    sender: broadcast::Sender<String>,
}

impl InMemoryBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

impl Default for InMemoryBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBroadcaster for InMemoryBroadcaster {
    async fn publish(&self, payload: &str) -> Result<()> {
        // 没有订阅者时send返回Err，广播本就是尽力而为，忽略即可
        let _ = self.sender.send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, String>> {
        let receiver = self.sender.subscribe();
        let stream = futures::stream::unfold(receiver, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => return Some((payload, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let queue = InMemoryEventQueue::new();
        queue.push("a").await.unwrap();
        queue.push("b").await.unwrap();

        assert_eq!(queue.size().await.unwrap(), 2);
        assert_eq!(
            queue.pop(Duration::from_millis(10)).await.unwrap(),
            Some("a".to_string())
        );
        assert_eq!(
            queue.pop(Duration::from_millis(10)).await.unwrap(),
            Some("b".to_string())
        );
    }

    #[tokio::test]
    async fn test_pop_times_out_on_empty_queue() {
        let queue = InMemoryEventQueue::new();
        let popped = queue.pop(Duration::from_millis(20)).await.unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_pop_wakes_on_concurrent_push() {
        let queue = std::sync::Arc::new(InMemoryEventQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push("x").await.unwrap();

        let popped = consumer.await.unwrap().unwrap();
        assert_eq!(popped, Some("x".to_string()));
    }

    #[tokio::test]
    async fn test_subscriber_sees_only_messages_after_subscription() {
        let broadcaster = InMemoryBroadcaster::new();

        // 订阅前发布的消息没有回放
        broadcaster.publish("before").await.unwrap();

        let mut stream = broadcaster.subscribe().await.unwrap();
        broadcaster.publish("after").await.unwrap();

        let received = stream.next().await.unwrap();
        assert_eq!(received, "after");
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_each_message() {
        let broadcaster = InMemoryBroadcaster::new();
        let mut first = broadcaster.subscribe().await.unwrap();
        let mut second = broadcaster.subscribe().await.unwrap();

        broadcaster.publish("fan-out").await.unwrap();

        assert_eq!(first.next().await.unwrap(), "fan-out");
        assert_eq!(second.next().await.unwrap(), "fan-out");
    }
}
