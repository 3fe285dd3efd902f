//! 共享库
//!
//! 包含积分扩展服务共用的配置加载与可观测性（日志、追踪、指标）基础设施代码。

pub mod config;
pub mod observability;
