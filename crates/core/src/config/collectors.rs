use serde::{Deserialize, Serialize};

/// 采集器总配置
///
/// 每个外部系统一个小节，`enabled` 控制是否在worker进程中调度。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorsConfig {
    pub airflow: AirflowCollectorConfig,
}

impl CollectorsConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.airflow.validate()
    }
}

/// Airflow采集器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirflowCollectorConfig {
    pub enabled: bool,
    pub polling_interval_seconds: u64,
    pub base_url: String,
    pub api_user: String,
    pub api_password: String,
}

impl Default for AirflowCollectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            polling_interval_seconds: 300,
            base_url: "http://localhost:8080/api/v1".to_string(),
            api_user: "airflow".to_string(),
            api_password: "airflow".to_string(),
        }
    }
}

impl AirflowCollectorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.base_url.is_empty() {
            return Err(anyhow::anyhow!("Airflow base_url不能为空"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(anyhow::anyhow!("Airflow base_url必须是HTTP(S)地址"));
        }

        if self.polling_interval_seconds == 0 {
            return Err(anyhow::anyhow!("Airflow轮询间隔必须大于0"));
        }

        Ok(())
    }
}

/// 外部请求重试策略配置
///
/// 退避间隔为 `base_delay_ms * 2^attempt`，带随机抖动。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub request_timeout_seconds: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            request_timeout_seconds: 10,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("最大重试次数必须大于0"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("请求超时时间必须大于0"));
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(anyhow::anyhow!("抖动系数必须在0.0到1.0之间"));
        }

        Ok(())
    }
}
