//! 电商平台客户端
//!
//! 通过 CommerceClient trait 抽象平台读写，便于测试时注入 mock 实现。
//! 生产实现走 GraphQL（`graphql` 模块），鉴权走 OAuth2 client credentials（`auth` 模块）。

pub mod auth;
pub mod graphql;

use async_trait::async_trait;
use bonus_points::{
    CartSnapshot, CustomObjectsPage, CustomerSnapshot, PointsError, UpdateAction,
};

pub use auth::TokenProvider;
pub use graphql::GraphQlCommerceClient;

/// 平台读写接口
///
/// 读取不到资源时返回对应的 NotFound 错误，而不是 `Ok(None)`：
/// 调用方在这些情况下必须失败，不能基于不完整的数据计算积分。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommerceClient: Send + Sync {
    /// 读取购物车（扩展请求未携带完整购物车时使用）
    async fn fetch_cart(&self, cart_id: &str) -> Result<CartSnapshot, PointsError>;

    /// 读取顾客及其积分自定义字段
    async fn fetch_customer(&self, customer_id: &str) -> Result<CustomerSnapshot, PointsError>;

    /// 读取积分档位自定义对象
    async fn fetch_rate_table(&self, container: &str) -> Result<CustomObjectsPage, PointsError>;

    /// 带版本号更新顾客，返回更新后的版本号
    async fn update_customer(
        &self,
        customer_id: &str,
        version: i64,
        actions: &[UpdateAction],
    ) -> Result<i64, PointsError>;

    /// 就绪检查：确认能够拿到访问令牌
    async fn health_check(&self) -> Result<(), PointsError>;
}
