use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use signalfire_core::Result;

use crate::records::{EventFilter, EventPage, NewLogEvent};

/// 持久化FIFO队列端口
///
/// 入队与出队是仅有的跨组件交接点，at-least-once语义：
/// 条目被弹出的瞬间所有权即转移给消费者，不做确认回执。
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// 追加到队尾
    async fn push(&self, payload: &str) -> Result<()>;

    /// 从队首弹出，最多阻塞`timeout`；超时返回None
    ///
    /// 有界等待让消费者循环能定期回头检查关闭信号。
    async fn pop(&self, timeout: Duration) -> Result<Option<String>>;

    /// 当前队列长度
    async fn size(&self) -> Result<u64>;
}

/// 发布/订阅广播端口
///
/// 无历史回放：订阅者只能看到订阅之后发布的消息。
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    async fn publish(&self, payload: &str) -> Result<()>;

    async fn subscribe(&self) -> Result<BoxStream<'static, String>>;
}

/// 事件持久化存储端口
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait EventStore: Send + Sync {
    /// 单事件单事务写入，返回行id
    async fn insert(&self, row: &NewLogEvent) -> Result<i64>;

    /// 按过滤条件检索已持久化事件
    async fn query(&self, filter: &EventFilter) -> Result<EventPage>;
}
