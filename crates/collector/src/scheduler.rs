use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use signalfire_core::{Result, SignalfireError};
use signalfire_domain::events::{EventCore, GenericEvent, LogEvent, LogLevel, StatusType};
use signalfire_domain::ingestion::IngestionService;
use signalfire_domain::task::CollectorTask;

use crate::Collector;

/// 空堆或无到期任务时的睡眠上限，保证关停信号及时生效
const MAX_SLEEP: Duration = Duration::from_secs(2);

struct ScheduledEntry {
    next_run: DateTime<Utc>,
    task: CollectorTask,
    collector: Arc<dyn Collector>,
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.next_run == other.next_run
    }
}

impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    // BinaryHeap是最大堆，反转比较得到最早到期优先
    fn cmp(&self, other: &Self) -> Ordering {
        other.next_run.cmp(&self.next_run)
    }
}

/// 采集器调度器
///
/// 最小堆按下一次到期时间排序，任务运行完重新入堆，进程存活期间不销毁。
/// 单轮出错走冷却间隔，调度循环本身永不退出（除非收到关停信号）。
pub struct CollectorScheduler {
    ingestion: Arc<IngestionService>,
    heap: BinaryHeap<ScheduledEntry>,
    cooldown: Duration,
}

impl CollectorScheduler {
    pub fn new(ingestion: Arc<IngestionService>, cooldown: Duration) -> Self {
        Self {
            ingestion,
            heap: BinaryHeap::new(),
            cooldown,
        }
    }

    /// 注册采集器，首轮立即到期
    pub fn register(&mut self, collector: Arc<dyn Collector>, interval: Duration) {
        let task = CollectorTask::new(collector.name(), interval);
        info!(
            "注册采集器: {}, 轮询间隔 {:?}",
            task.collector_identity, interval
        );
        self.heap.push(ScheduledEntry {
            next_run: Utc::now(),
            task,
            collector,
        });
    }

    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("采集调度器启动, 共 {} 个采集器", self.heap.len());

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("采集调度器收到关停信号");
                    break;
                }
                result = self.tick() => {
                    if let Err(e) = result {
                        error!("调度轮次失败: {e}");
                        tokio::time::sleep(self.cooldown).await;
                    }
                }
            }
        }

        info!("采集调度器已停止");
    }

    /// 单个调度轮次：运行到期任务或睡到下一次到期
    async fn tick(&mut self) -> Result<()> {
        let now = Utc::now();

        let wait = match self.heap.peek() {
            None => Some(MAX_SLEEP),
            Some(entry) if !entry.task.is_eligible(now) => {
                let until = (entry.next_run - now).to_std().unwrap_or(Duration::ZERO);
                Some(until.min(MAX_SLEEP))
            }
            Some(_) => None,
        };

        if let Some(duration) = wait {
            tokio::time::sleep(duration).await;
            return Ok(());
        }

        if let Some(mut entry) = self.heap.pop() {
            let outcome = self.run_entry(&entry).await;
            entry.task.mark_ran(Utc::now());
            entry.next_run = entry.task.next_eligible();
            self.heap.push(entry);
            outcome?;
        }

        Ok(())
    }

    /// 运行一个采集器并把产出事件送入接收管线
    ///
    /// Upstream错误视为连通性中断，静默放弃本轮（不合成事件）；
    /// 其余错误合成一条失败事件入队。
    async fn run_entry(&self, entry: &ScheduledEntry) -> Result<()> {
        let name = &entry.task.collector_identity;

        match entry.collector.collect().await {
            Ok(events) => {
                info!("采集器 {name} 本轮产出 {} 个事件", events.len());
                for event in &events {
                    self.ingestion.ingest_one(&event.to_value()).await?;
                }
            }
            Err(SignalfireError::Upstream(e)) => {
                warn!("采集器 {name} 连通性探测失败，本轮放弃: {e}");
            }
            Err(e) => {
                error!("采集器 {name} 运行失败: {e}");
                let failure = failure_event(name, &e);
                self.ingestion.ingest_one(&failure.to_value()).await?;
            }
        }

        Ok(())
    }
}

/// 任务失败时合成的哨兵事件
fn failure_event(collector_name: &str, error: &SignalfireError) -> LogEvent {
    LogEvent::Generic(GenericEvent {
        core: EventCore {
            timestamp: Utc::now(),
            source: collector_name.to_string(),
            status_type: StatusType::Failure,
            log_level: LogLevel::Error,
            message: format!("Error running task: {error}"),
        },
        additional_data: Default::default(),
    })
}
