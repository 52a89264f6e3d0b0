use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use signalfire_domain::events::LogLevel;
use signalfire_domain::records::{EventFilter, EventPage};

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

/// 单条接收响应
#[derive(Debug, Serialize)]
pub struct LogIngestionResponse {
    pub success: bool,
    pub message: String,
    pub event_id: Uuid,
    pub warnings: Vec<String>,
}

/// 批量接收响应
///
/// `failed_events` 是请求数组中失败条目的0起始下标。
#[derive(Debug, Serialize)]
pub struct BatchLogIngestionResponse {
    pub success: bool,
    pub message: String,
    pub event_ids: Vec<Uuid>,
    pub failed_events: Vec<usize>,
}

/// POST /api/events/ingest
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(raw): Json<Value>,
) -> ApiResult<Json<LogIngestionResponse>> {
    let outcome = state.ingestion.ingest_one(&raw).await?;

    Ok(Json(LogIngestionResponse {
        success: true,
        message: "Log ingested successfully".to_string(),
        event_id: outcome.event_id,
        warnings: outcome.warnings,
    }))
}

/// POST /api/events/ingest/batch
///
/// 逐条独立处理，整体永远返回200，失败条目通过下标列表上报。
pub async fn ingest_batch(
    State(state): State<AppState>,
    Json(raws): Json<Vec<Value>>,
) -> Json<BatchLogIngestionResponse> {
    let outcome = state.ingestion.ingest_batch(&raws).await;

    let message = if outcome.failed.is_empty() {
        format!("Successfully ingested {} logs", outcome.event_ids.len())
    } else {
        format!(
            "Ingested {} logs, {} failed",
            outcome.event_ids.len(),
            outcome.failed.len()
        )
    };

    Json(BatchLogIngestionResponse {
        success: outcome.failed.is_empty(),
        message,
        event_ids: outcome.event_ids,
        failed_events: outcome.failed,
    })
}

/// GET /api/events 查询参数
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub source: Option<String>,
    pub log_level: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

/// GET /api/events
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<EventPage>> {
    let log_level = match &query.log_level {
        Some(raw) => Some(
            LogLevel::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("无效的日志级别: {raw}")))?,
        ),
        None => None,
    };

    if query.offset < 0 {
        return Err(ApiError::BadRequest("offset不能为负数".to_string()));
    }

    let filter = EventFilter {
        source: query.source,
        log_level,
        start_date: query.start_date,
        end_date: query.end_date,
        limit: query.limit,
        offset: query.offset,
    };

    let page = state.store.query(&filter).await?;
    Ok(Json(page))
}

/// GET /api/events/stream
///
/// SSE推送：每个落库后的事件作为一条`update`事件下发，
/// keep-alive文本心跳与事件流区分，客户端据此判断连接存活。
pub async fn stream_events(
    State(state): State<AppState>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let stream = state.broadcaster.subscribe().await?;

    let sse_stream =
        stream.map(|payload| Ok::<_, Infallible>(Event::default().event("update").data(payload)));

    Ok(Sse::new(sse_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive-text"),
    ))
}
