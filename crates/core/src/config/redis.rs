use serde::{Deserialize, Serialize};

/// Redis配置
///
/// 队列与广播通道共用同一个Redis实例：
/// 队列为 `queue_key` 上的列表（LPUSH/BRPOP），
/// 广播为 `channel` 上的PUB/SUB频道。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub queue_key: String,
    pub channel: String,
    pub pop_timeout_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            queue_key: "log_queue".to_string(),
            channel: "sse_channel".to_string(),
            pop_timeout_seconds: 5,
        }
    }
}

impl RedisConfig {
    /// 校验Redis配置
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.is_empty() {
            return Err(anyhow::anyhow!("Redis URL不能为空"));
        }

        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(anyhow::anyhow!("Redis URL必须以redis://或rediss://开头"));
        }

        if self.queue_key.is_empty() {
            return Err(anyhow::anyhow!("队列键名不能为空"));
        }

        if self.channel.is_empty() {
            return Err(anyhow::anyhow!("广播频道名不能为空"));
        }

        if self.pop_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("队列弹出等待时间必须大于0，否则会无限阻塞"));
        }

        Ok(())
    }
}
