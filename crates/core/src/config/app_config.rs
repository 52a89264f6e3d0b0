use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    collectors::{CollectorsConfig, RetryConfig},
    database::DatabaseConfig,
    redis::RedisConfig,
    service::{ApiConfig, WorkerConfig},
};

/// 系统配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub redis: RedisConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub worker: WorkerConfig,
    pub collectors: CollectorsConfig,
    pub retry: RetryConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序：
    /// 1. 默认配置
    /// 2. TOML配置文件
    /// 3. 环境变量覆盖（前缀: SIGNALFIRE_，层级分隔符: __）
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults =
            ConfigBuilder::try_from(&AppConfig::default()).context("构建默认配置失败")?;

        let mut builder = ConfigBuilder::builder().add_source(defaults);

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            // 尝试默认配置文件路径，找不到则只用默认值
            let default_paths = [
                "config/signalfire.toml",
                "signalfire.toml",
                "/etc/signalfire/config.toml",
            ];
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("SIGNALFIRE")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("合并配置源失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// 校验整体配置
    pub fn validate(&self) -> Result<()> {
        self.redis.validate()?;
        self.database.validate()?;
        self.api.validate()?;
        self.worker.validate()?;
        self.collectors.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.redis.queue_key, "log_queue");
        assert_eq!(config.redis.channel, "sse_channel");
        assert_eq!(config.retry.max_attempts, 3);
        assert!(!config.collectors.airflow.enabled);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[redis]
url = "redis://redis-host:6379/1"
queue_key = "events"

[collectors.airflow]
enabled = true
polling_interval_seconds = 60
base_url = "http://airflow:8080/api/v1"
api_user = "ops"
api_password = "secret"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.redis.url, "redis://redis-host:6379/1");
        assert_eq!(config.redis.queue_key, "events");
        // 未覆盖的字段保持默认值
        assert_eq!(config.redis.channel, "sse_channel");
        assert!(config.collectors.airflow.enabled);
        assert_eq!(config.collectors.airflow.polling_interval_seconds, 60);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = AppConfig::load(Some("/nonexistent/signalfire.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_pop_timeout() {
        let mut config = AppConfig::default();
        config.redis.pop_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_database_url() {
        let mut config = AppConfig::default();
        config.database.url = "mysql://localhost/x".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_collector_skips_url_check() {
        let mut config = AppConfig::default();
        config.collectors.airflow.enabled = false;
        config.collectors.airflow.base_url = String::new();
        assert!(config.validate().is_ok());
    }
}
