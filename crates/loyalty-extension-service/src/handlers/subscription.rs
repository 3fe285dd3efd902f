//! 订单订阅消息处理器

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use crate::{
    dto::{ActionsBody, SubscriptionMessage},
    error::ExtensionError,
    state::AppState,
};

/// 订单创建后合并积分并写回顾客
///
/// POST /subscriptions/order
///
/// 响应体为已提交到顾客的动作；消息被忽略或无需更新时为空列表。
/// 写入失败（含版本冲突）返回错误状态，由推送方重投。
pub async fn order_created(
    State(state): State<AppState>,
    payload: Result<Json<SubscriptionMessage>, JsonRejection>,
) -> Result<Json<ActionsBody>, ExtensionError> {
    let Json(message) = payload?;

    let actions = state
        .service
        .handle_order_message(message)
        .await?
        .map(|award| award.actions)
        .unwrap_or_default();

    Ok(Json(ActionsBody::new(actions)))
}
