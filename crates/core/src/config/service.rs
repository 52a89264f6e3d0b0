use serde::{Deserialize, Serialize};

/// API服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub cors_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8000".to_string(),
            cors_enabled: true,
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.enabled && self.bind_address.is_empty() {
            return Err(anyhow::anyhow!("API监听地址不能为空"));
        }
        Ok(())
    }
}

/// Worker进程配置
///
/// `cooldown_seconds` 是消费循环和调度循环出错后的冷却时间，
/// 循环本身永不因单次失败而退出。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub cooldown_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_seconds: 5,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cooldown_seconds == 0 {
            return Err(anyhow::anyhow!("冷却时间必须大于0"));
        }
        Ok(())
    }
}
