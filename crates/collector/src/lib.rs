pub mod airflow;
pub mod retry;
pub mod scheduler;

use async_trait::async_trait;

use signalfire_core::Result;
use signalfire_domain::events::LogEvent;

pub use airflow::{AirflowCollector, HttpAirflowApi};
pub use retry::RetryPolicy;
pub use scheduler::CollectorScheduler;

/// 外部系统采集器接口
///
/// 一次`collect`对应一轮采集运行：返回Ok即本轮合成的事件列表，
/// 返回Err表示本轮被放弃（例如连通性探测失败）。
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;

    async fn collect(&self) -> Result<Vec<LogEvent>>;
}
