//! 积分合并
//!
//! 订单确认后积分才真正入账：新获积分 + 顾客已有积分。
//! 购物车阶段只做预览，不走这里。

/// 顾客的历史积分状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorPoints {
    /// 顾客没有分配积分自定义类型，即未加入积分计划
    NotOptedIn,
    /// 已分配积分类型但积分字段尚未写入
    Unset,
    /// 已有积分余额
    Balance(u64),
}

/// 合并新获积分与历史积分
///
/// 返回 `None` 表示顾客未加入积分计划，调用方必须跳过更新，
/// 不能顺带为顾客创建自定义类型。
pub fn reconcile_points(earned_points: u64, prior: PriorPoints) -> Option<u64> {
    match prior {
        PriorPoints::NotOptedIn => None,
        PriorPoints::Unset => Some(earned_points),
        PriorPoints::Balance(points) => Some(earned_points.saturating_add(points)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_opted_in_skips() {
        assert_eq!(reconcile_points(510, PriorPoints::NotOptedIn), None);
        assert_eq!(reconcile_points(0, PriorPoints::NotOptedIn), None);
    }

    #[test]
    fn test_unset_treated_as_zero() {
        assert_eq!(reconcile_points(510, PriorPoints::Unset), Some(510));
        assert_eq!(
            reconcile_points(510, PriorPoints::Unset),
            reconcile_points(510, PriorPoints::Balance(0))
        );
    }

    #[test]
    fn test_balance_is_added() {
        for (earned, prior) in [(0, 0), (1, 0), (0, 1), (300, 1200), (510, 99_999)] {
            assert_eq!(
                reconcile_points(earned, PriorPoints::Balance(prior)),
                Some(earned + prior)
            );
        }
    }

    #[test]
    fn test_balance_saturates() {
        assert_eq!(
            reconcile_points(10, PriorPoints::Balance(u64::MAX - 1)),
            Some(u64::MAX)
        );
    }
}
