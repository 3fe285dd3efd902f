//! 扩展服务错误类型
//!
//! 引擎错误直接透传，由本层映射为 HTTP 状态码和平台扩展错误格式：
//! `{"errors": [{"code": "...", "message": "..."}]}`。

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bonus_points::PointsError;
use serde_json::json;

/// 扩展服务错误
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error(transparent)]
    Points(#[from] PointsError),

    /// 入站共享密钥缺失或不匹配
    #[error("扩展调用鉴权失败")]
    Unauthorized,

    #[error("请求格式错误: {0}")]
    BadRequest(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ExtensionError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Points(err) => match err {
                PointsError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
                PointsError::CartNotFound(_)
                | PointsError::CustomerNotFound(_)
                | PointsError::RateTableNotFound { .. } => StatusCode::NOT_FOUND,
                PointsError::ConcurrentModification { .. } => StatusCode::CONFLICT,
                PointsError::RateTableMalformed(_)
                | PointsError::CustomerMalformed { .. }
                | PointsError::OrderMalformed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PointsError::GraphQLQueryFailed(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Points(err) => err.code(),
            Self::Unauthorized => "Authentication",
            Self::BadRequest(_) => "InvalidInput",
            Self::Internal(_) => "Internal",
        }
    }
}

impl IntoResponse for ExtensionError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 上游与内部错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Points(PointsError::GraphQLQueryFailed(detail)) => {
                tracing::error!(error = %detail, "平台 GraphQL 调用失败");
                "上游平台调用失败".to_string()
            }
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => {
                tracing::warn!(code = other.error_code(), error = %other, "请求处理失败");
                other.to_string()
            }
        };

        let body = json!({
            "errors": [{
                "code": self.error_code(),
                "message": message,
            }]
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for ExtensionError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ExtensionError>;
