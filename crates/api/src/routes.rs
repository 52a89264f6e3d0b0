use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use signalfire_domain::ingestion::IngestionService;
use signalfire_domain::ports::{EventBroadcaster, EventStore};

use crate::handlers::{
    events::{ingest_batch, ingest_event, list_events, stream_events},
    health::health_check,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<IngestionService>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub store: Arc<dyn EventStore>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 事件接收API
        .route("/api/events/ingest", post(ingest_event))
        .route("/api/events/ingest/batch", post(ingest_batch))
        // 事件检索与实时推送API
        .route("/api/events", get(list_events))
        .route("/api/events/stream", get(stream_events))
        .with_state(state)
}
