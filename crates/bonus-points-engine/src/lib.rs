//! 积分奖励计算引擎
//!
//! 购物车/订单生命周期事件触发的积分计算核心，不包含任何 I/O。
//! 调用方负责读取购物车、顾客、积分档位配置，本引擎只做纯计算并返回更新动作。
//!
//! ## 模块结构
//!
//! - `tier`: 积分档位表查找（金额 -> 积分）
//! - `reconcile`: 新获积分与顾客历史积分合并
//! - `synthesis`: 将积分结果转换为平台更新动作
//! - `calculator`: 购物车/订单两条路径的统一入口
//! - `models`: 购物车、订单、顾客快照
//! - `actions`: 平台更新动作词汇
//! - `error`: 错误类型定义

pub mod actions;
pub mod calculator;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod synthesis;
pub mod tier;

// 重新导出核心类型
pub use actions::{LocalizedString, ResourceIdentifier, UpdateAction};
pub use calculator::{BonusPointsCalculator, CustomerAward, ExtensionResponse};
pub use error::{PointsError, Result};
pub use models::{
    AwardResult, CartSnapshot, CustomFields, CustomLineItem, CustomerCustom, CustomerSnapshot,
    Money, OrderSnapshot, RawCustomField,
};
pub use reconcile::{PriorPoints, reconcile_points};
pub use synthesis::{
    AwardSettings, synthesize_cart_actions, synthesize_cart_clear_actions, synthesize_customer_actions,
};
pub use tier::{
    CustomObjectEntry, CustomObjectsPage, RateTable, Tier, TierPriority, compute_earned_points,
};
