//! 存活/就绪探针

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tracing::warn;

use crate::{dto::HealthResponse, state::AppState};

pub const SERVICE_NAME: &str = "loyalty-extension-service";

/// 存活探针：服务进程正常即返回 ok
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
    })
}

/// 就绪探针：确认能从平台获取访问令牌
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.service.ready().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": SERVICE_NAME,
                "checks": { "commerce": "ok" }
            })),
        ),
        Err(e) => {
            warn!(error = %e, "就绪检查失败");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "service": SERVICE_NAME,
                    "checks": { "commerce": "fail" }
                })),
            )
        }
    }
}
