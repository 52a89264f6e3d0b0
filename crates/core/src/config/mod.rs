mod app_config;
mod collectors;
mod database;
mod redis;
mod service;

pub use app_config::AppConfig;
pub use collectors::{AirflowCollectorConfig, CollectorsConfig, RetryConfig};
pub use database::DatabaseConfig;
pub use redis::RedisConfig;
pub use service::{ApiConfig, WorkerConfig};
