use thiserror::Error;

/// 状态信标统一错误类型
#[derive(Debug, Error)]
pub enum SignalfireError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("队列存储错误: {0}")]
    QueueStore(String),

    #[error("广播通道错误: {0}")]
    Broadcast(String),

    #[error("事件缺少必需的公共字段: {0}")]
    MalformedEvent(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("上游系统不可用: {0}")]
    Upstream(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, SignalfireError>;
