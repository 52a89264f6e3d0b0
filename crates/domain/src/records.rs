use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{LogEvent, LogLevel, StatusType, COMMON_FIELDS};

/// 待持久化的事件行
///
/// 公共字段提升为可索引的标量列，变体特有字段整体序列化进payload列。
#[derive(Debug, Clone)]
pub struct NewLogEvent {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub status_type: StatusType,
    pub log_level: LogLevel,
    pub message: String,
    pub payload: Value,
}

impl NewLogEvent {
    pub fn from_event(event: &LogEvent) -> Self {
        let core = event.core().clone();
        let mut payload = event.to_value();
        if let Value::Object(map) = &mut payload {
            for field in COMMON_FIELDS {
                map.remove(field);
            }
        }

        Self {
            timestamp: core.timestamp,
            source: core.source,
            status_type: core.status_type,
            log_level: core.log_level,
            message: core.message,
            payload,
        }
    }
}

/// 已持久化的事件行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredLogEvent {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub status_type: String,
    pub log_level: String,
    pub message: String,
    pub payload: Value,
}

/// 事件检索过滤条件
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub source: Option<String>,
    pub log_level: Option<LogLevel>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl EventFilter {
    /// 检索条数的硬上限
    pub const MAX_LIMIT: i64 = 1000;

    pub fn effective_limit(&self) -> i64 {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }
}

/// 事件检索结果页
#[derive(Debug, Clone, Serialize)]
pub struct EventPage {
    pub logs: Vec<StoredLogEvent>,
    pub total_count: i64,
    pub has_more: bool,
}
