//! 积分引擎错误类型
//!
//! 读取阶段的数据缺失一律以带类型的错误抛出，由传输层映射为 HTTP 状态码。
//! 预期内的空结果（无顾客、零金额、零积分）不是错误，直接短路为空操作。

use thiserror::Error;

/// 积分计算错误
#[derive(Debug, Error)]
pub enum PointsError {
    // ==================== 档位配置错误 ====================
    #[error("积分档位配置格式错误: {0}")]
    RateTableMalformed(String),

    #[error("积分档位配置不存在: container={container}")]
    RateTableNotFound { container: String },

    // ==================== 资源读取错误 ====================
    #[error("购物车不存在: {0}")]
    CartNotFound(String),

    #[error("顾客不存在: {0}")]
    CustomerNotFound(String),

    #[error("顾客积分字段格式错误: customer_id={customer_id}, {message}")]
    CustomerMalformed {
        customer_id: String,
        message: String,
    },

    #[error("订单积分字段格式错误: order_id={order_id}, {message}")]
    OrderMalformed { order_id: String, message: String },

    #[error("GraphQL 查询失败: {0}")]
    GraphQLQueryFailed(String),

    // ==================== 请求错误 ====================
    #[error("不支持的操作: {0}")]
    InvalidOperation(String),

    /// 平台乐观锁拒绝写入：读取到的版本号已过期
    #[error("资源版本冲突: {resource} version={version}")]
    ConcurrentModification { resource: String, version: i64 },
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, PointsError>;

impl PointsError {
    /// 获取错误码（同时用作平台扩展错误响应中的 code）
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateTableMalformed(_) => "RateTableMalformed",
            Self::RateTableNotFound { .. } => "RateTableNotFound",
            Self::CartNotFound(_) => "CartNotFound",
            Self::CustomerNotFound(_) => "CustomerNotFound",
            Self::CustomerMalformed { .. } => "CustomerMalformed",
            Self::OrderMalformed { .. } => "OrderMalformed",
            Self::GraphQLQueryFailed(_) => "GraphQLQueryFailed",
            Self::InvalidOperation(_) => "InvalidOperation",
            Self::ConcurrentModification { .. } => "ConcurrentModification",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GraphQLQueryFailed(_) | Self::ConcurrentModification { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = PointsError::RateTableNotFound {
            container: "bonus-points-tiers".to_string(),
        };
        assert_eq!(err.code(), "RateTableNotFound");
        assert_eq!(
            err.to_string(),
            "积分档位配置不存在: container=bonus-points-tiers"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(PointsError::GraphQLQueryFailed("timeout".into()).is_retryable());
        assert!(
            PointsError::ConcurrentModification {
                resource: "customer".into(),
                version: 3,
            }
            .is_retryable()
        );
        assert!(!PointsError::InvalidOperation("Delete".into()).is_retryable());
        assert!(!PointsError::RateTableMalformed("addon".into()).is_retryable());
        assert!(
            !PointsError::OrderMalformed {
                order_id: "o-1".into(),
                message: "points".into(),
            }
            .is_retryable()
        );
    }
}
