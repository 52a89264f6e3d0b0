use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use signalfire_core::SignalfireError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("信标服务错误: {0}")]
    Signalfire(#[from] SignalfireError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_type) = match &self {
            ApiError::Signalfire(SignalfireError::MalformedEvent(msg)) => (
                StatusCode::BAD_REQUEST,
                format!("事件格式错误: {}", msg),
                "MALFORMED_EVENT",
            ),
            ApiError::Signalfire(SignalfireError::Serialization(msg)) => (
                StatusCode::BAD_REQUEST,
                format!("序列化失败: {}", msg),
                "SERIALIZATION_ERROR",
            ),
            ApiError::Signalfire(SignalfireError::Upstream(msg)) => (
                StatusCode::BAD_GATEWAY,
                format!("上游系统不可用: {}", msg),
                "UPSTREAM_ERROR",
            ),
            ApiError::Signalfire(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("系统内部错误: {}", msg),
                "INTERNAL_ERROR",
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {}", msg),
                "BAD_REQUEST",
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
