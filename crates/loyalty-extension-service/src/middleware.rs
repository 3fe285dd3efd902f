//! 扩展调用鉴权中间件
//!
//! 平台调用 API extension 与推送订阅消息时，在 `x-extension-secret` 头中携带部署时
//! 配置的共享密钥。未配置密钥时中间件直接放行。

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::error::ExtensionError;
use crate::state::AppState;

/// 共享密钥 Header 名称
pub const EXTENSION_SECRET_HEADER: &str = "x-extension-secret";

/// 共享密钥校验
pub async fn extension_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.extension_secret.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(EXTENSION_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(provided) if constant_time_eq(provided.as_bytes(), expected.as_bytes()) => {
            next.run(request).await
        }
        Some(_) => {
            warn!(path = %request.uri().path(), "扩展密钥不匹配");
            ExtensionError::Unauthorized.into_response()
        }
        None => {
            warn!(path = %request.uri().path(), "缺少扩展密钥");
            ExtensionError::Unauthorized.into_response()
        }
    }
}

/// 长度相同时逐字节比较全部内容，耗时与首个差异位置无关
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
