use std::sync::Arc;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use signalfire_core::Result;

use crate::events::classify;
use crate::ports::{EventBroadcaster, EventQueue};

/// 单条事件的接收结果
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub event_id: Uuid,
    pub warnings: Vec<String>,
}

/// 批量接收结果
///
/// `failed` 是输入序列中失败条目的0起始下标，批内无原子性。
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub event_ids: Vec<Uuid>,
    pub failed: Vec<usize>,
    pub warnings: Vec<String>,
}

/// 事件接收服务
///
/// 同步接收路径的唯一入口：分类、入队、广播。
/// 队列和广播句柄由构造方注入，便于测试时替换为内存实现。
pub struct IngestionService {
    queue: Arc<dyn EventQueue>,
    broadcaster: Arc<dyn EventBroadcaster>,
}

impl IngestionService {
    pub fn new(queue: Arc<dyn EventQueue>, broadcaster: Arc<dyn EventBroadcaster>) -> Self {
        Self { queue, broadcaster }
    }

    /// 接收单条事件
    ///
    /// 先入队后广播；广播失败只记日志，不回滚已完成的入队。
    /// 仅在公共字段缺失时返回错误（MalformedEvent）。
    pub async fn ingest_one(&self, raw: &Value) -> Result<IngestOutcome> {
        let classified = classify(raw)?;
        for warning in &classified.warnings {
            warn!("事件分类降级: {warning}");
        }

        let payload = classified.event.serialize()?;
        self.queue.push(&payload).await?;

        if let Err(e) = self.broadcaster.publish(&payload).await {
            warn!("广播发布失败（入队已完成，不回滚）: {e}");
        }

        Ok(IngestOutcome {
            event_id: Uuid::new_v4(),
            warnings: classified.warnings,
        })
    }

    /// 批量接收
    ///
    /// 逐条独立处理，单条失败不影响其他条目。
    pub async fn ingest_batch(&self, raws: &[Value]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (index, raw) in raws.iter().enumerate() {
            match self.ingest_one(raw).await {
                Ok(item) => {
                    outcome.event_ids.push(item.event_id);
                    outcome.warnings.extend(item.warnings);
                }
                Err(e) => {
                    warn!("批量接收第 {index} 条失败: {e}");
                    outcome.failed.push(index);
                }
            }
        }

        outcome
    }
}
