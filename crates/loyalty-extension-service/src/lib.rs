//! 积分奖励扩展服务
//!
//! 接收平台的购物车 API extension 调用与订单订阅消息，
//! 读取顾客与积分档位后调用 `bonus_points` 引擎计算，并返回或写入更新动作。
//!
//! ## 模块结构
//!
//! - `client`: 平台 GraphQL 客户端与 OAuth 令牌
//! - `service`: 读取、计算、写回的编排
//! - `handlers`: HTTP 请求处理器
//! - `middleware`: 共享密钥校验
//! - `routes`: 路由配置
//! - `dto`: 请求和响应结构
//! - `error`: 错误类型与 HTTP 映射
//! - `state`: 应用状态

pub mod client;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod state;

pub use client::{CommerceClient, GraphQlCommerceClient};
pub use error::ExtensionError;
pub use service::LoyaltyService;
pub use state::AppState;
