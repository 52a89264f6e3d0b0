use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

use signalfire_core::config::RedisConfig;
use signalfire_core::{Result, SignalfireError};
use signalfire_domain::ports::{EventBroadcaster, EventQueue};

/// 建立Redis连接，返回队列与广播两个句柄
///
/// BRPOP走独立的连接管理器：同一连接上命令串行执行，
/// 阻塞弹出若与LPUSH/PUBLISH共用连接会把后者压在超时之后。
/// 订阅同样使用独立的PubSub连接
/// （Redis协议限制：进入订阅模式的连接不能再发普通命令）。
pub async fn connect_redis(config: &RedisConfig) -> Result<(RedisEventQueue, RedisBroadcaster)> {
    let client = Client::open(config.url.as_str())
        .map_err(|e| SignalfireError::QueueStore(format!("创建Redis客户端失败: {e}")))?;

    let manager = client
        .get_connection_manager()
        .await
        .map_err(|e| SignalfireError::QueueStore(format!("连接Redis失败: {e}")))?;

    let blocking_manager = client
        .get_connection_manager()
        .await
        .map_err(|e| SignalfireError::QueueStore(format!("连接Redis失败: {e}")))?;

    info!("已连接Redis队列/广播存储");

    let queue = RedisEventQueue::new(manager.clone(), blocking_manager, config.queue_key.clone());
    let broadcaster = RedisBroadcaster::new(client, manager, config.channel.clone());
    Ok((queue, broadcaster))
}

/// Redis列表实现的持久化FIFO队列
///
/// 生产者LPUSH到队头，消费者BRPOP从队尾弹出，形成先进先出。
/// `blocking_conn`只承载BRPOP，入队与广播不会排在阻塞命令之后。
pub struct RedisEventQueue {
    conn: ConnectionManager,
    blocking_conn: ConnectionManager,
    queue_key: String,
}

impl RedisEventQueue {
    pub fn new(
        conn: ConnectionManager,
        blocking_conn: ConnectionManager,
        queue_key: String,
    ) -> Self {
        Self {
            conn,
            blocking_conn,
            queue_key,
        }
    }
}

#[async_trait]
impl EventQueue for RedisEventQueue {
    async fn push(&self, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .lpush(&self.queue_key, payload)
            .await
            .map_err(|e| SignalfireError::QueueStore(format!("入队失败: {e}")))?;
        debug!("事件已入队: {}", self.queue_key);
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<String>> {
        let mut conn = self.blocking_conn.clone();
        // BRPOP带超时的有界阻塞，超时返回None让调用方重查关闭信号
        let result: Option<(String, String)> = conn
            .brpop(&self.queue_key, timeout.as_secs_f64())
            .await
            .map_err(|e| SignalfireError::QueueStore(format!("出队失败: {e}")))?;
        Ok(result.map(|(_, payload)| payload))
    }

    async fn size(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn
            .llen(&self.queue_key)
            .await
            .map_err(|e| SignalfireError::QueueStore(format!("查询队列长度失败: {e}")))?;
        Ok(len)
    }
}

/// Redis PUB/SUB实现的广播通道
pub struct RedisBroadcaster {
    client: Client,
    conn: ConnectionManager,
    channel: String,
}

impl RedisBroadcaster {
    pub fn new(client: Client, conn: ConnectionManager, channel: String) -> Self {
        Self {
            client,
            conn,
            channel,
        }
    }
}

#[async_trait]
impl EventBroadcaster for RedisBroadcaster {
    async fn publish(&self, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .publish(&self.channel, payload)
            .await
            .map_err(|e| SignalfireError::Broadcast(format!("发布失败: {e}")))?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, String>> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| SignalfireError::Broadcast(format!("创建订阅连接失败: {e}")))?;

        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(|e| SignalfireError::Broadcast(format!("订阅频道失败: {e}")))?;

        debug!("已订阅广播频道: {}", self.channel);

        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move { msg.get_payload::<String>().ok() })
            .boxed();

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Instant, SystemTime, UNIX_EPOCH};

    fn test_config() -> RedisConfig {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        RedisConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            queue_key: format!("test_queue_{suffix}"),
            channel: format!("test_channel_{suffix}"),
            pop_timeout_seconds: 5,
        }
    }

    #[tokio::test]
    #[ignore = "需要本地Redis实例"]
    async fn test_push_not_delayed_by_inflight_blocking_pop() {
        let config = test_config();
        let (queue, _broadcaster) = connect_redis(&config).await.unwrap();
        let queue = std::sync::Arc::new(queue);

        // 先让BRPOP在空队列上挂起，再从入队路径写入
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        queue.push("payload").await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));

        let popped = consumer.await.unwrap().unwrap();
        assert_eq!(popped.as_deref(), Some("payload"));
    }
}
