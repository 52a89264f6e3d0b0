use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use signalfire_core::Result;
use signalfire_domain::events::classify;
use signalfire_domain::ports::{EventBroadcaster, EventQueue, EventStore};
use signalfire_domain::records::NewLogEvent;

/// 持久化worker
///
/// 队列的唯一消费者：弹出、分类、落库、落库成功后再广播。
/// 广播永远在写库之后，订阅者看到的事件一定已经持久化。
pub struct PersistenceWorker {
    queue: Arc<dyn EventQueue>,
    store: Arc<dyn EventStore>,
    broadcaster: Arc<dyn EventBroadcaster>,
    pop_timeout: Duration,
    cooldown: Duration,
}

impl PersistenceWorker {
    pub fn new(
        queue: Arc<dyn EventQueue>,
        store: Arc<dyn EventStore>,
        broadcaster: Arc<dyn EventBroadcaster>,
        pop_timeout: Duration,
        cooldown: Duration,
    ) -> Self {
        Self {
            queue,
            store,
            broadcaster,
            pop_timeout,
            cooldown,
        }
    }

    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("持久化worker启动");

        // 有界弹出顺序执行，不与关停信号竞争：
        // 已从队列弹出的条目一定会被处理完，关停在轮次之间生效
        loop {
            match self.queue.pop(self.pop_timeout).await {
                Ok(Some(payload)) => {
                    if let Err(e) = self.process_entry(&payload).await {
                        error!("处理队列条目失败: {e}");
                        tokio::time::sleep(self.cooldown).await;
                    }
                }
                Ok(None) => {
                    // 有界等待超时，回头检查关停信号
                }
                Err(e) => {
                    error!("队列弹出失败: {e}");
                    tokio::time::sleep(self.cooldown).await;
                }
            }

            match shutdown_rx.try_recv() {
                Err(broadcast::error::TryRecvError::Empty) => {}
                _ => {
                    info!("持久化worker收到关停信号");
                    break;
                }
            }
        }

        info!("持久化worker已停止");
    }

    /// 处理单个队列条目：分类、写库、广播
    ///
    /// 畸形条目记日志后丢弃，不阻塞后续消费；
    /// 写库失败作为错误上抛，由消费循环走冷却间隔。
    pub async fn process_entry(&self, payload: &str) -> Result<()> {
        let raw: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("队列条目不是合法JSON，丢弃: {e}");
                return Ok(());
            }
        };

        let classified = match classify(&raw) {
            Ok(classified) => classified,
            Err(e) => {
                warn!("队列条目分类失败，丢弃: {e}");
                return Ok(());
            }
        };
        for warning in &classified.warnings {
            warn!("队列条目分类降级: {warning}");
        }

        let row = NewLogEvent::from_event(&classified.event);
        let id = self.store.insert(&row).await?;
        debug!(
            "事件已落库: id={id}, source={}, variant={}",
            row.source,
            classified.event.variant_name()
        );

        // 落库成功后才广播，失败只记日志，不回滚已写入的行
        let serialized = classified.event.serialize()?;
        if let Err(e) = self.broadcaster.publish(&serialized).await {
            warn!("广播发布失败（落库已完成）: {e}");
        }

        Ok(())
    }
}
