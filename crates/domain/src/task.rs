use std::time::Duration;

use chrono::{DateTime, Utc};

/// 采集器调度表项
///
/// 每个启用的采集器在worker启动时创建一条，之后只更新`last_run`，
/// 进程存活期间永不销毁：每次运行结束都会重新入队等待下一轮。
#[derive(Debug, Clone)]
pub struct CollectorTask {
    /// 采集器标识（对应具体的外部系统适配器）
    pub collector_identity: String,
    pub interval: Duration,
    pub last_run: DateTime<Utc>,
}

impl CollectorTask {
    pub fn new(collector_identity: impl Into<String>, interval: Duration) -> Self {
        // last_run取纪元起点，首轮立即可运行
        Self {
            collector_identity: collector_identity.into(),
            interval,
            last_run: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// `now - last_run >= interval` 时可运行
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_run).to_std().unwrap_or(Duration::ZERO) >= self.interval
    }

    /// 下一次可运行的时间点
    pub fn next_eligible(&self) -> DateTime<Utc> {
        self.last_run + chrono::Duration::from_std(self.interval).unwrap_or(chrono::Duration::zero())
    }

    pub fn mark_ran(&mut self, now: DateTime<Utc>) {
        self.last_run = now;
    }
}
