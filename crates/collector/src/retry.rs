use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use signalfire_core::config::RetryConfig;
use signalfire_core::{Result, SignalfireError};

/// 有界指数退避重试策略
///
/// 第`attempt`次失败后等待 `base_delay * 2^attempt`（带随机抖动），
/// 尝试耗尽后返回最后一次的错误作为哨兵结果，由调用方消化。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            jitter_factor: config.jitter_factor,
        }
    }

    /// 第`attempt`次失败后的退避时长（attempt从0计）
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        if self.jitter_factor <= 0.0 {
            return exponential;
        }
        let jitter = rand::rng().random_range(0.0..=self.jitter_factor);
        exponential.mul_f64(1.0 + jitter)
    }

    /// 执行操作直到成功或尝试耗尽
    pub async fn execute<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "操作 {op_name} 第 {} 次尝试失败: {e}",
                        attempt + 1
                    );
                    last_error = Some(e);
                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SignalfireError::Upstream(format!("操作 {op_name} 重试次数耗尽"))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn no_jitter(max_attempts: u32, base_delay: Duration) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds_with_two_backoff_waits() {
        let policy = no_jitter(3, Duration::from_millis(100));
        let attempts = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = policy
            .execute("probe", || {
                let attempts = attempts.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(SignalfireError::Upstream("暂时不可达".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // 两次退避等待：100ms * 2^0 + 100ms * 2^1
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_error() {
        let policy = no_jitter(3, Duration::from_millis(10));
        let attempts = Arc::new(AtomicU32::new(0));

        let result: Result<()> = policy
            .execute("probe", || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(SignalfireError::Upstream("一直失败".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(SignalfireError::Upstream(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt_does_not_wait() {
        let policy = no_jitter(3, Duration::from_secs(60));
        let result = policy.execute("probe", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_backoff_delay_doubles_each_attempt() {
        let policy = no_jitter(5, Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
    }
}
