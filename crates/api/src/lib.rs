//! 信标HTTP服务
//!
//! 基于Axum的REST与SSE网关：
//! - `POST /api/events/ingest` - 接收单条日志事件
//! - `POST /api/events/ingest/batch` - 批量接收日志事件
//! - `GET /api/events` - 检索已持久化事件
//! - `GET /api/events/stream` - SSE实时事件推送
//! - `GET /health` - 健康检查

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

use axum::Router;
use tower::ServiceBuilder;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::create_routes;
use signalfire_core::config::ApiConfig;

pub use routes::AppState;

/// 创建完整的API应用
pub fn create_app(state: AppState, api_config: &ApiConfig) -> Router {
    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(cors_layer())
    } else {
        router
    }
}
