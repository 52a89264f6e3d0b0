use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use signalfire_core::config::{AirflowCollectorConfig, RetryConfig};
use signalfire_core::{Result, SignalfireError};
use signalfire_domain::events::{
    EventCore, FailedRunEvent, GenericEvent, HealthCheckEvent, ImportErrorEvent, LogEvent,
    LogLevel, StatusType, AIRFLOW_FAILED_DAG_SOURCE, AIRFLOW_HEALTH_CHECK_SOURCE,
    AIRFLOW_IMPORT_ERROR_SOURCE,
};

use crate::retry::RetryPolicy;
use crate::Collector;

/// Airflow健康状态的正常哨兵值
const HEALTHY: &str = "healthy";

/// 失败DAG运行的回看窗口（小时）
const FAILED_RUN_LOOKBACK_HOURS: i64 = 24;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComponentHealth {
    #[serde(default)]
    pub status: String,
}

/// GET /health 响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AirflowHealth {
    #[serde(default)]
    pub metadatabase: ComponentHealth,
    #[serde(default)]
    pub scheduler: ComponentHealth,
    #[serde(default)]
    pub triggerer: ComponentHealth,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirflowImportError {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub filename: String,
    pub stack_trace: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ImportErrorsResponse {
    #[serde(default)]
    import_errors: Vec<AirflowImportError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirflowDagRun {
    pub dag_id: String,
    pub execution_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct DagRunsResponse {
    #[serde(default)]
    dag_runs: Vec<AirflowDagRun>,
}

/// Airflow REST API客户端接口
///
/// 采集逻辑只依赖这三个调用，HTTP细节收在实现里。
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait AirflowApi: Send + Sync {
    async fn health(&self) -> Result<AirflowHealth>;

    async fn import_errors(&self) -> Result<Vec<AirflowImportError>>;

    async fn failed_dag_runs(&self, since: DateTime<Utc>) -> Result<Vec<AirflowDagRun>>;
}

/// 基于reqwest的Airflow API客户端
///
/// 每个请求都走重试策略，最终失败统一映射为Upstream错误。
pub struct HttpAirflowApi {
    client: reqwest::Client,
    base_url: String,
    api_user: String,
    api_password: String,
    retry: RetryPolicy,
}

impl HttpAirflowApi {
    pub fn new(config: &AirflowCollectorConfig, retry_config: &RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(retry_config.request_timeout_seconds))
            .build()
            .map_err(|e| SignalfireError::Configuration(format!("构建HTTP客户端失败: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_user: config.api_user.clone(),
            api_password: config.api_password.clone(),
            retry: RetryPolicy::from_config(retry_config),
        })
    }

    async fn request<T, F>(&self, path: &str, build: F) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let build = &build;
        self.retry
            .execute(path, || async move {
                let response = build()
                    .basic_auth(&self.api_user, Some(&self.api_password))
                    .send()
                    .await
                    .map_err(|e| {
                        SignalfireError::Upstream(format!("请求Airflow {path} 失败: {e}"))
                    })?;

                let response = response.error_for_status().map_err(|e| {
                    SignalfireError::Upstream(format!("Airflow {path} 返回错误状态: {e}"))
                })?;

                response.json::<T>().await.map_err(|e| {
                    SignalfireError::Upstream(format!("解析Airflow {path} 响应失败: {e}"))
                })
            })
            .await
    }
}

#[async_trait]
impl AirflowApi for HttpAirflowApi {
    async fn health(&self) -> Result<AirflowHealth> {
        let url = format!("{}/health", self.base_url);
        self.request("/health", || self.client.get(&url)).await
    }

    async fn import_errors(&self) -> Result<Vec<AirflowImportError>> {
        let url = format!("{}/importErrors", self.base_url);
        let response: ImportErrorsResponse =
            self.request("/importErrors", || self.client.get(&url)).await?;
        Ok(response.import_errors)
    }

    async fn failed_dag_runs(&self, since: DateTime<Utc>) -> Result<Vec<AirflowDagRun>> {
        let url = format!("{}/dags/~/dagRuns/list", self.base_url);
        let body = json!({
            "states": ["failed"],
            "start_date_gte": since.to_rfc3339(),
        });
        let response: DagRunsResponse = self
            .request("/dags/~/dagRuns/list", || {
                self.client.post(&url).json(&body)
            })
            .await?;
        Ok(response.dag_runs)
    }
}

/// Airflow采集器
///
/// 一轮采集：健康探测作为连通性门控，探测失败整轮放弃；
/// 探测通过后依次合成健康事件、导入错误事件、失败DAG运行事件，
/// 后两节各自失败时只跳过该节，不影响已合成的事件。
pub struct AirflowCollector {
    api: Arc<dyn AirflowApi>,
}

impl AirflowCollector {
    pub fn new(api: Arc<dyn AirflowApi>) -> Self {
        Self { api }
    }

    fn health_event(health: &AirflowHealth) -> LogEvent {
        let meta = &health.metadatabase.status;
        let sched = &health.scheduler.status;
        let trig = &health.triggerer.status;
        let all_healthy = meta == HEALTHY && sched == HEALTHY && trig == HEALTHY;

        let (status_type, log_level, message) = if all_healthy {
            (
                StatusType::Normal,
                LogLevel::Info,
                format!("Health check passed! Metadatabase: {meta}, Scheduler: {sched}, Triggerer: {trig}"),
            )
        } else {
            (
                StatusType::Incident,
                LogLevel::Error,
                format!("Warning: Health check failed! Metadatabase: {meta}, Scheduler: {sched}, Triggerer: {trig}"),
            )
        };

        LogEvent::HealthCheck(HealthCheckEvent {
            core: EventCore {
                timestamp: Utc::now(),
                source: AIRFLOW_HEALTH_CHECK_SOURCE.to_string(),
                status_type,
                log_level,
                message,
            },
            metadatabase_status: meta.clone(),
            scheduler_status: sched.clone(),
            triggerer_status: trig.clone(),
        })
    }

    fn import_error_event(error: &AirflowImportError) -> LogEvent {
        LogEvent::ImportError(ImportErrorEvent {
            core: EventCore {
                timestamp: error.timestamp.unwrap_or_else(Utc::now),
                source: AIRFLOW_IMPORT_ERROR_SOURCE.to_string(),
                status_type: StatusType::Failure,
                log_level: LogLevel::Error,
                message: format!("Import error: {} - {}", error.filename, error.stack_trace),
            },
            filename: error.filename.clone(),
            stack_trace: error.stack_trace.clone(),
        })
    }

    fn no_import_errors_event() -> LogEvent {
        LogEvent::Generic(GenericEvent {
            core: EventCore {
                timestamp: Utc::now(),
                source: "airflow".to_string(),
                status_type: StatusType::Normal,
                log_level: LogLevel::Info,
                message: "No import errors found.".to_string(),
            },
            additional_data: Default::default(),
        })
    }

    fn failed_run_event(run: &AirflowDagRun) -> LogEvent {
        LogEvent::FailedRun(FailedRunEvent {
            core: EventCore {
                timestamp: run.execution_date,
                source: AIRFLOW_FAILED_DAG_SOURCE.to_string(),
                status_type: StatusType::Failure,
                log_level: LogLevel::Error,
                message: format!("DAG failed: {}", run.dag_id),
            },
            dag_id: run.dag_id.clone(),
            execution_date: run.execution_date,
            try_number: 0,
        })
    }
}

#[async_trait]
impl Collector for AirflowCollector {
    fn name(&self) -> &str {
        "airflow"
    }

    async fn collect(&self) -> Result<Vec<LogEvent>> {
        // 健康探测失败视为连通性中断，本轮不产出任何事件
        let health = self.api.health().await?;

        let mut events = vec![Self::health_event(&health)];

        match self.api.import_errors().await {
            Ok(errors) if errors.is_empty() => events.push(Self::no_import_errors_event()),
            Ok(errors) => {
                for error in &errors {
                    events.push(Self::import_error_event(error));
                }
            }
            Err(e) => warn!("获取Airflow导入错误失败，本轮跳过该节: {e}"),
        }

        let since = Utc::now() - chrono::Duration::hours(FAILED_RUN_LOOKBACK_HOURS);
        match self.api.failed_dag_runs(since).await {
            Ok(runs) => {
                debug!("发现 {} 个失败的DAG运行", runs.len());
                for run in &runs {
                    events.push(Self::failed_run_event(run));
                }
            }
            Err(e) => warn!("获取失败DAG运行失败，本轮跳过该节: {e}"),
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> AirflowHealth {
        AirflowHealth {
            metadatabase: ComponentHealth {
                status: HEALTHY.to_string(),
            },
            scheduler: ComponentHealth {
                status: HEALTHY.to_string(),
            },
            triggerer: ComponentHealth {
                status: HEALTHY.to_string(),
            },
        }
    }

    fn degraded() -> AirflowHealth {
        AirflowHealth {
            metadatabase: ComponentHealth {
                status: HEALTHY.to_string(),
            },
            scheduler: ComponentHealth {
                status: "unhealthy".to_string(),
            },
            triggerer: ComponentHealth {
                status: HEALTHY.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_collect_synthesizes_healthy_event() {
        let mut api = MockAirflowApi::new();
        api.expect_health().returning(|| Ok(healthy()));
        api.expect_import_errors().returning(|| Ok(vec![]));
        api.expect_failed_dag_runs().returning(|_| Ok(vec![]));

        let collector = AirflowCollector::new(Arc::new(api));
        let events = collector.collect().await.unwrap();

        match &events[0] {
            LogEvent::HealthCheck(e) => {
                assert_eq!(e.core.status_type, StatusType::Normal);
                assert_eq!(e.core.log_level, LogLevel::Info);
                assert!(e.core.message.starts_with("Health check passed!"));
            }
            other => panic!("expected HealthCheck, got {}", other.variant_name()),
        }
    }

    #[tokio::test]
    async fn test_collect_flags_unhealthy_component() {
        let mut api = MockAirflowApi::new();
        api.expect_health().returning(|| Ok(degraded()));
        api.expect_import_errors().returning(|| Ok(vec![]));
        api.expect_failed_dag_runs().returning(|_| Ok(vec![]));

        let collector = AirflowCollector::new(Arc::new(api));
        let events = collector.collect().await.unwrap();

        match &events[0] {
            LogEvent::HealthCheck(e) => {
                assert_eq!(e.core.status_type, StatusType::Incident);
                assert_eq!(e.core.log_level, LogLevel::Error);
                assert!(e.core.message.starts_with("Warning: Health check failed!"));
                assert_eq!(e.scheduler_status, "unhealthy");
            }
            other => panic!("expected HealthCheck, got {}", other.variant_name()),
        }
    }

    #[tokio::test]
    async fn test_health_probe_failure_aborts_round() {
        let mut api = MockAirflowApi::new();
        api.expect_health()
            .returning(|| Err(SignalfireError::Upstream("连接被拒绝".to_string())));
        api.expect_import_errors().times(0);
        api.expect_failed_dag_runs().times(0);

        let collector = AirflowCollector::new(Arc::new(api));
        let result = collector.collect().await;
        assert!(matches!(result, Err(SignalfireError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_empty_import_errors_produce_summary_event() {
        let mut api = MockAirflowApi::new();
        api.expect_health().returning(|| Ok(healthy()));
        api.expect_import_errors().returning(|| Ok(vec![]));
        api.expect_failed_dag_runs().returning(|_| Ok(vec![]));

        let collector = AirflowCollector::new(Arc::new(api));
        let events = collector.collect().await.unwrap();

        assert_eq!(events.len(), 2);
        match &events[1] {
            LogEvent::Generic(e) => {
                assert_eq!(e.core.source, "airflow");
                assert_eq!(e.core.message, "No import errors found.");
            }
            other => panic!("expected Generic, got {}", other.variant_name()),
        }
    }

    #[tokio::test]
    async fn test_each_import_error_becomes_an_event() {
        let mut api = MockAirflowApi::new();
        api.expect_health().returning(|| Ok(healthy()));
        api.expect_import_errors().returning(|| {
            Ok(vec![
                AirflowImportError {
                    timestamp: None,
                    filename: "dags/a.py".to_string(),
                    stack_trace: "SyntaxError".to_string(),
                },
                AirflowImportError {
                    timestamp: None,
                    filename: "dags/b.py".to_string(),
                    stack_trace: "ImportError".to_string(),
                },
            ])
        });
        api.expect_failed_dag_runs().returning(|_| Ok(vec![]));

        let collector = AirflowCollector::new(Arc::new(api));
        let events = collector.collect().await.unwrap();

        assert_eq!(events.len(), 3);
        match &events[1] {
            LogEvent::ImportError(e) => {
                assert_eq!(e.core.message, "Import error: dags/a.py - SyntaxError");
                assert_eq!(e.core.status_type, StatusType::Failure);
            }
            other => panic!("expected ImportError, got {}", other.variant_name()),
        }
    }

    #[tokio::test]
    async fn test_failed_dag_runs_become_events() {
        let execution_date: DateTime<Utc> = "2024-06-01T00:00:00Z".parse().unwrap();
        let mut api = MockAirflowApi::new();
        api.expect_health().returning(|| Ok(healthy()));
        api.expect_import_errors().returning(|| Ok(vec![]));
        api.expect_failed_dag_runs().returning(move |_| {
            Ok(vec![AirflowDagRun {
                dag_id: "etl_daily".to_string(),
                execution_date,
            }])
        });

        let collector = AirflowCollector::new(Arc::new(api));
        let events = collector.collect().await.unwrap();

        match events.last().unwrap() {
            LogEvent::FailedRun(e) => {
                assert_eq!(e.core.message, "DAG failed: etl_daily");
                assert_eq!(e.dag_id, "etl_daily");
                assert_eq!(e.execution_date, execution_date);
            }
            other => panic!("expected FailedRun, got {}", other.variant_name()),
        }
    }

    #[tokio::test]
    async fn test_import_errors_failure_skips_section_only() {
        let mut api = MockAirflowApi::new();
        api.expect_health().returning(|| Ok(healthy()));
        api.expect_import_errors()
            .returning(|| Err(SignalfireError::Upstream("503".to_string())));
        api.expect_failed_dag_runs().returning(|_| Ok(vec![]));

        let collector = AirflowCollector::new(Arc::new(api));
        let events = collector.collect().await.unwrap();

        // 只剩健康事件
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], LogEvent::HealthCheck(_)));
    }
}
