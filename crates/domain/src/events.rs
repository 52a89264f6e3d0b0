use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use signalfire_core::{Result, SignalfireError};

/// Airflow事件源前缀，带此前缀的source按类型化变体解析
pub const AIRFLOW_SOURCE_PREFIX: &str = "airflow_";
pub const AIRFLOW_HEALTH_CHECK_SOURCE: &str = "airflow_health_check";
pub const AIRFLOW_IMPORT_ERROR_SOURCE: &str = "airflow_import_error";
pub const AIRFLOW_FAILED_DAG_SOURCE: &str = "airflow_failed_dag";
pub const DBT_SOURCE: &str = "dbt";

/// 所有变体共有的五个公共字段名
pub const COMMON_FIELDS: [&str; 5] = ["timestamp", "source", "status_type", "log_level", "message"];

/// 事件状态类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusType {
    Normal,
    Notice,
    Incident,
    Failure,
    Outage,
}

impl StatusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusType::Normal => "normal",
            StatusType::Notice => "notice",
            StatusType::Incident => "incident",
            StatusType::Failure => "failure",
            StatusType::Outage => "outage",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(StatusType::Normal),
            "notice" => Some(StatusType::Notice),
            "incident" => Some(StatusType::Incident),
            "failure" => Some(StatusType::Failure),
            "outage" => Some(StatusType::Outage),
            _ => None,
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARNING" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }
}

/// 事件公共字段
///
/// 任何变体都必须携带这五个字段，缺一即为格式错误（MalformedEvent）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCore {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub status_type: StatusType,
    pub log_level: LogLevel,
    pub message: String,
}

/// Airflow健康检查事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckEvent {
    #[serde(flatten)]
    pub core: EventCore,
    pub metadatabase_status: String,
    pub scheduler_status: String,
    pub triggerer_status: String,
}

/// Airflow DAG导入错误事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportErrorEvent {
    #[serde(flatten)]
    pub core: EventCore,
    pub filename: String,
    pub stack_trace: String,
}

/// Airflow失败DAG运行事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRunEvent {
    #[serde(flatten)]
    pub core: EventCore,
    pub dag_id: String,
    pub execution_date: DateTime<Utc>,
    pub try_number: u32,
}

/// dbt转换工具日志事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbtEvent {
    #[serde(flatten)]
    pub core: EventCore,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
}

/// 兜底事件：任何无法归入类型化变体的输入都落到这里
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericEvent {
    #[serde(flatten)]
    pub core: EventCore,
    #[serde(default)]
    pub additional_data: Map<String, Value>,
}

/// 归一化后的日志事件
///
/// 封闭的变体集合。分类是全函数：只要公共字段齐全，
/// 任何输入都有且仅有一个合法变体（Generic兜底保证）。
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LogEvent {
    HealthCheck(HealthCheckEvent),
    ImportError(ImportErrorEvent),
    FailedRun(FailedRunEvent),
    Dbt(DbtEvent),
    Generic(GenericEvent),
}

impl LogEvent {
    pub fn core(&self) -> &EventCore {
        match self {
            LogEvent::HealthCheck(e) => &e.core,
            LogEvent::ImportError(e) => &e.core,
            LogEvent::FailedRun(e) => &e.core,
            LogEvent::Dbt(e) => &e.core,
            LogEvent::Generic(e) => &e.core,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            LogEvent::HealthCheck(_) => "health_check",
            LogEvent::ImportError(_) => "import_error",
            LogEvent::FailedRun(_) => "failed_run",
            LogEvent::Dbt(_) => "dbt",
            LogEvent::Generic(_) => "generic",
        }
    }

    pub fn serialize(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SignalfireError::Serialization(e.to_string()))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// 分类结果：事件本体加上降级产生的警告
///
/// 警告只随结果返回给调用方，分类本身从不因变体字段缺失而失败。
#[derive(Debug, Clone)]
pub struct Classified {
    pub event: LogEvent,
    pub warnings: Vec<String>,
}

/// 把原始载荷归一化为一个事件变体
///
/// 规则：
/// - 五个公共字段缺失或类型不符 => `MalformedEvent`（唯一的失败路径）；
/// - source带`airflow_`前缀或等于`dbt` => 尝试对应的类型化变体，
///   变体字段缺失/畸形时就地捕获，降级为Generic并记录一条警告；
/// - 其余source一律Generic，不算错误，也不产生警告。
pub fn classify(raw: &Value) -> Result<Classified> {
    let obj = raw
        .as_object()
        .ok_or_else(|| SignalfireError::MalformedEvent("事件载荷必须是JSON对象".to_string()))?;

    for field in COMMON_FIELDS {
        if !obj.contains_key(field) {
            return Err(SignalfireError::MalformedEvent(format!(
                "缺少公共字段: {field}"
            )));
        }
    }

    let core: EventCore = serde_json::from_value(raw.clone())
        .map_err(|e| SignalfireError::MalformedEvent(format!("公共字段解析失败: {e}")))?;

    let mut warnings = Vec::new();

    let event = if core.source.starts_with(AIRFLOW_SOURCE_PREFIX) {
        match core.source.as_str() {
            AIRFLOW_HEALTH_CHECK_SOURCE => {
                try_typed(raw, &core, &mut warnings, LogEvent::HealthCheck)
            }
            AIRFLOW_IMPORT_ERROR_SOURCE => {
                try_typed(raw, &core, &mut warnings, LogEvent::ImportError)
            }
            AIRFLOW_FAILED_DAG_SOURCE => try_typed(raw, &core, &mut warnings, LogEvent::FailedRun),
            other => {
                warnings.push(format!("未知的Airflow事件类型 {other}，按Generic处理"));
                LogEvent::Generic(generic_from(obj, &core))
            }
        }
    } else if core.source == DBT_SOURCE {
        try_typed(raw, &core, &mut warnings, LogEvent::Dbt)
    } else {
        LogEvent::Generic(generic_from(obj, &core))
    };

    Ok(Classified { event, warnings })
}

/// 尝试类型化变体，失败则降级为Generic并追加警告
fn try_typed<T, F>(raw: &Value, core: &EventCore, warnings: &mut Vec<String>, wrap: F) -> LogEvent
where
    T: serde::de::DeserializeOwned,
    F: FnOnce(T) -> LogEvent,
{
    match serde_json::from_value::<T>(raw.clone()) {
        Ok(typed) => wrap(typed),
        Err(e) => {
            warnings.push(format!(
                "事件不满足 {} 的变体字段要求，降级为Generic: {e}",
                core.source
            ));
            // 原始对象一定存在，上层已校验过
            let obj = raw.as_object().cloned().unwrap_or_default();
            LogEvent::Generic(generic_from(&obj, core))
        }
    }
}

/// 构造Generic变体：公共字段之外的字段全部收进additional_data
///
/// 已序列化Generic事件再次分类时，嵌套的additional_data会被合并展开，
/// 保证重复分类不会层层套娃。
fn generic_from(obj: &Map<String, Value>, core: &EventCore) -> GenericEvent {
    let mut additional_data = Map::new();
    for (key, value) in obj {
        if COMMON_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if key == "additional_data" {
            if let Value::Object(nested) = value {
                for (k, v) in nested {
                    additional_data.insert(k.clone(), v.clone());
                }
            }
            continue;
        }
        additional_data.insert(key.clone(), value.clone());
    }

    GenericEvent {
        core: core.clone(),
        additional_data,
    }
}
