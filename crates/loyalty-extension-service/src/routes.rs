//! 路由配置模块

use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use loyalty_shared::observability::middleware as obs_middleware;
use tower_http::timeout::TimeoutLayer;

use crate::{handlers, middleware::extension_auth, state::AppState};

/// 平台回调路由，需通过共享密钥校验
fn callback_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/extensions/cart", post(handlers::extension::cart_extension))
        .route(
            "/subscriptions/order",
            post(handlers::subscription::order_created),
        )
        .layer(middleware::from_fn_with_state(state, extension_auth))
}

/// 构建完整应用
pub fn app(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(callback_routes(state.clone()))
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .layer(TimeoutLayer::new(request_timeout))
        // 可观测性中间件：请求追踪和指标收集
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
