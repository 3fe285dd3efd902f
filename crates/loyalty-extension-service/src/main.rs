//! 积分奖励扩展服务
//!
//! 平台购物车 API extension 与订单订阅消息的 HTTP 入口。

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bonus_points::{AwardSettings, BonusPointsCalculator, TierPriority};
use loyalty_extension::{AppState, GraphQlCommerceClient, LoyaltyService, routes};
use loyalty_shared::{config::AppConfig, observability};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("loyalty-extension-service").context("加载配置失败")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting loyalty-extension-service on {}", config.server_addr());
    info!(commerce = ?config.commerce, "平台连接配置");

    if config.commerce.client_id.is_empty() {
        warn!("commerce.client_id 未配置，平台调用将失败");
    }

    let loyalty = &config.loyalty;
    let tier_priority = TierPriority::from_str(&loyalty.tier_priority)?;
    let settings = AwardSettings {
        custom_type_key: loyalty.custom_type_key.clone(),
        points_field: loyalty.points_field.clone(),
        line_item_slug: loyalty.line_item_slug.clone(),
        tax_category_key: loyalty.tax_category_key.clone(),
        name_en: loyalty.name_en.clone(),
        name_de: loyalty.name_de.clone(),
    };

    let client = GraphQlCommerceClient::new(&config.commerce).context("创建平台客户端失败")?;
    let service = LoyaltyService::new(
        Arc::new(client),
        BonusPointsCalculator::new(settings),
        loyalty.rate_table_container.clone(),
        tier_priority,
    );

    if loyalty.extension_secret.is_none() && config.is_production() {
        warn!("生产环境未配置 loyalty.extension_secret，扩展端点不做鉴权");
    }

    let state =
        AppState::new(Arc::new(service)).with_extension_secret(loyalty.extension_secret.clone());
    let app = routes::app(
        state,
        Duration::from_secs(config.server.request_timeout_seconds),
    );

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 优雅关闭：收到 SIGTERM 或 Ctrl+C 后等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
