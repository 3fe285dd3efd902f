//! 购物车 API extension 处理器

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use tracing::info;

use crate::{
    dto::{ActionsBody, ExtensionRequest},
    error::ExtensionError,
    state::AppState,
};

/// 购物车创建/更新时由平台同步调用
///
/// POST /extensions/cart
///
/// 有动作时返回 200，无需更新时返回 201 与空动作列表。
pub async fn cart_extension(
    State(state): State<AppState>,
    payload: Result<Json<ExtensionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ActionsBody>), ExtensionError> {
    let Json(request) = payload?;

    let response = state.service.handle_cart_extension(request).await?;
    let status =
        StatusCode::from_u16(response.status_code).map_err(|e| ExtensionError::Internal(e.to_string()))?;

    if let Some(award) = response.award {
        info!(
            earned_points = award.earned_points,
            action_count = response.actions.len(),
            "购物车积分动作已返回"
        );
    }

    Ok((status, Json(ActionsBody::new(response.actions))))
}
