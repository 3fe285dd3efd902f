//! 积分档位表
//!
//! 金额落入某个档位 `[min_cart_value, max_cart_value]` 时，
//! 获得积分 = round(金额 / 100 * factor + addon)。
//! 多个档位同时命中时按 `TierPriority` 决定胜出者，默认取最后一个命中的档位。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use validator::{Validate, ValidationError};

use crate::error::{PointsError, Result};

/// 单个积分档位（金额均为最小货币单位）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_tier_range"))]
pub struct Tier {
    #[validate(range(min = 0.0))]
    pub min_cart_value: f64,
    pub max_cart_value: f64,
    #[validate(range(min = 0.0))]
    pub factor: f64,
    #[validate(range(min = 0.0))]
    pub addon: f64,
}

fn validate_tier_range(tier: &Tier) -> std::result::Result<(), ValidationError> {
    let values = [
        tier.min_cart_value,
        tier.max_cart_value,
        tier.factor,
        tier.addon,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::new("non_finite_value"));
    }
    if tier.max_cart_value < tier.min_cart_value {
        return Err(ValidationError::new("max_below_min"));
    }
    Ok(())
}

impl Tier {
    pub fn new(min_cart_value: f64, max_cart_value: f64, factor: f64, addon: f64) -> Self {
        Self {
            min_cart_value,
            max_cart_value,
            factor,
            addon,
        }
    }

    /// 金额是否落在档位区间内（两端闭区间）
    pub fn matches(&self, cart_total: u64) -> bool {
        let total = cart_total as f64;
        self.min_cart_value <= total && total <= self.max_cart_value
    }

    /// 按本档位计算积分，只在最后做一次四舍五入（远离零）
    pub fn award(&self, cart_total: u64) -> u64 {
        let raw = cart_total as f64 / 100.0 * self.factor + self.addon;
        raw.round() as u64
    }

    fn span(&self) -> f64 {
        self.max_cart_value - self.min_cart_value
    }
}

/// 档位重叠时的胜出规则
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierPriority {
    /// 列表中最后一个命中的档位
    #[default]
    LastDefined,
    /// 列表中第一个命中的档位
    FirstDefined,
    /// 区间最窄的档位，宽度相同时取靠后的
    MostSpecific,
}

impl FromStr for TierPriority {
    type Err = PointsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "last_defined" => Ok(Self::LastDefined),
            "first_defined" => Ok(Self::FirstDefined),
            "most_specific" => Ok(Self::MostSpecific),
            other => Err(PointsError::RateTableMalformed(format!(
                "未知的档位优先级: {other}"
            ))),
        }
    }
}

impl fmt::Display for TierPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LastDefined => "last_defined",
            Self::FirstDefined => "first_defined",
            Self::MostSpecific => "most_specific",
        };
        f.write_str(name)
    }
}

/// 按默认规则（最后命中者胜出）计算积分，没有命中返回 0
pub fn compute_earned_points(cart_total: u64, tiers: &[Tier]) -> u64 {
    tiers
        .iter()
        .rev()
        .find(|tier| tier.matches(cart_total))
        .map(|tier| tier.award(cart_total))
        .unwrap_or(0)
}

/// 自定义对象查询结果页
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomObjectsPage {
    #[serde(default)]
    pub results: Vec<CustomObjectEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomObjectEntry {
    pub key: String,
    pub value: Value,
}

/// 一个自定义对象里可以是单个档位、档位数组或以名称为键的档位集合
#[derive(Deserialize)]
#[serde(untagged)]
enum TierBlock {
    Single(Tier),
    List(Vec<Tier>),
    Named(BTreeMap<String, Tier>),
}

impl TierBlock {
    fn into_tiers(self) -> Vec<Tier> {
        match self {
            Self::Single(tier) => vec![tier],
            Self::List(tiers) => tiers,
            // BTreeMap 按名称排序，保证顺序确定
            Self::Named(map) => map.into_values().collect(),
        }
    }
}

/// 已校验的积分档位表
#[derive(Debug, Clone)]
pub struct RateTable {
    tiers: Vec<Tier>,
    priority: TierPriority,
}

impl RateTable {
    /// 构造档位表，任何一个档位不合法即整体失败
    pub fn new(tiers: Vec<Tier>) -> Result<Self> {
        for (idx, tier) in tiers.iter().enumerate() {
            tier.validate().map_err(|e| {
                PointsError::RateTableMalformed(format!("档位 #{idx} 校验失败: {e}"))
            })?;
        }
        Ok(Self {
            tiers,
            priority: TierPriority::default(),
        })
    }

    pub fn with_priority(mut self, priority: TierPriority) -> Self {
        self.priority = priority;
        self
    }

    /// 从自定义对象查询结果加载档位表
    ///
    /// 顺序：结果顺序 -> 单个对象内的档位顺序。没有任何结果视为配置不存在。
    pub fn from_custom_objects(container: &str, page: CustomObjectsPage) -> Result<Self> {
        if page.results.is_empty() {
            return Err(PointsError::RateTableNotFound {
                container: container.to_string(),
            });
        }

        let mut tiers = Vec::new();
        for entry in page.results {
            let block: TierBlock = serde_json::from_value(entry.value).map_err(|e| {
                PointsError::RateTableMalformed(format!(
                    "container={container} key={}: {e}",
                    entry.key
                ))
            })?;
            tiers.extend(block.into_tiers());
        }

        if tiers.is_empty() {
            return Err(PointsError::RateTableNotFound {
                container: container.to_string(),
            });
        }

        debug!(container, tier_count = tiers.len(), "积分档位表加载完成");
        Self::new(tiers)
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn priority(&self) -> TierPriority {
        self.priority
    }

    /// 按优先级规则选出命中的档位
    pub fn matching_tier(&self, cart_total: u64) -> Option<&Tier> {
        let mut candidates = self.tiers.iter().filter(|tier| tier.matches(cart_total));
        match self.priority {
            TierPriority::LastDefined => candidates.last(),
            TierPriority::FirstDefined => candidates.next(),
            TierPriority::MostSpecific => candidates.fold(None, |best: Option<&Tier>, tier| {
                match best {
                    Some(b) if b.span() < tier.span() => Some(b),
                    _ => Some(tier),
                }
            }),
        }
    }

    /// 计算获得积分，没有命中的档位返回 0
    pub fn compute_earned_points(&self, cart_total: u64) -> u64 {
        self.matching_tier(cart_total)
            .map(|tier| tier.award(cart_total))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(values: Vec<Value>) -> CustomObjectsPage {
        CustomObjectsPage {
            results: values
                .into_iter()
                .enumerate()
                .map(|(i, value)| CustomObjectEntry {
                    key: format!("tier-{i}"),
                    value,
                })
                .collect(),
        }
    }

    #[test]
    fn test_single_matching_tier() {
        let tiers = [Tier::new(0.0, 20000.0, 5.0, 10.0)];
        // 100.00 * 5 + 10
        assert_eq!(compute_earned_points(10000, &tiers), 510);
    }

    #[test]
    fn test_no_matching_tier_returns_zero() {
        let tiers = [Tier::new(100.0, 5000.0, 2.0, 0.0)];
        assert_eq!(compute_earned_points(99, &tiers), 0);
        assert_eq!(compute_earned_points(5001, &tiers), 0);
        assert_eq!(compute_earned_points(10000, &[]), 0);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let tiers = [Tier::new(100.0, 5000.0, 1.0, 0.0)];
        assert_eq!(compute_earned_points(100, &tiers), 1);
        assert_eq!(compute_earned_points(5000, &tiers), 50);
    }

    #[test]
    fn test_overlapping_tiers_last_wins() {
        let tiers = [
            Tier::new(0.0, 100000.0, 1.0, 0.0),
            Tier::new(5000.0, 20000.0, 3.0, 5.0),
        ];
        assert_eq!(compute_earned_points(10000, &tiers), 305);

        let reversed = [tiers[1], tiers[0]];
        assert_eq!(compute_earned_points(10000, &reversed), 100);
    }

    #[test]
    fn test_rounding_once_half_away_from_zero() {
        // 1.50 * 1 + 0 = 1.5 -> 2
        let tiers = [Tier::new(0.0, 1000.0, 1.0, 0.0)];
        assert_eq!(compute_earned_points(150, &tiers), 2);

        // 1.49 * 1 + 0.4 = 1.89 -> 2；若先对 1.49 取整再加 0.4 会得到 1
        let tiers = [Tier::new(0.0, 1000.0, 1.0, 0.4)];
        assert_eq!(compute_earned_points(149, &tiers), 2);
    }

    #[test]
    fn test_priority_first_defined_and_most_specific() {
        let tiers = vec![
            Tier::new(0.0, 100000.0, 1.0, 0.0),
            Tier::new(5000.0, 20000.0, 3.0, 5.0),
            Tier::new(0.0, 50000.0, 2.0, 0.0),
        ];

        let first = RateTable::new(tiers.clone())
            .unwrap()
            .with_priority(TierPriority::FirstDefined);
        assert_eq!(first.compute_earned_points(10000), 100);

        let specific = RateTable::new(tiers.clone())
            .unwrap()
            .with_priority(TierPriority::MostSpecific);
        assert_eq!(specific.compute_earned_points(10000), 305);

        let last = RateTable::new(tiers).unwrap();
        assert_eq!(last.priority(), TierPriority::LastDefined);
        assert_eq!(last.compute_earned_points(10000), 200);
    }

    #[test]
    fn test_most_specific_tie_goes_to_later_tier() {
        let table = RateTable::new(vec![
            Tier::new(0.0, 20000.0, 1.0, 0.0),
            Tier::new(0.0, 20000.0, 2.0, 0.0),
        ])
        .unwrap()
        .with_priority(TierPriority::MostSpecific);
        assert_eq!(table.compute_earned_points(10000), 200);
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!(
            "most_specific".parse::<TierPriority>().unwrap(),
            TierPriority::MostSpecific
        );
        assert_eq!(TierPriority::FirstDefined.to_string(), "first_defined");
        assert!("newest".parse::<TierPriority>().is_err());
    }

    #[test]
    fn test_invalid_tier_rejected() {
        let err = RateTable::new(vec![Tier::new(500.0, 100.0, 1.0, 0.0)]).unwrap_err();
        assert_eq!(err.code(), "RateTableMalformed");

        let err = RateTable::new(vec![Tier::new(0.0, 100.0, -1.0, 0.0)]).unwrap_err();
        assert_eq!(err.code(), "RateTableMalformed");

        let err = RateTable::new(vec![Tier::new(0.0, f64::INFINITY, 1.0, 0.0)]).unwrap_err();
        assert_eq!(err.code(), "RateTableMalformed");
    }

    #[test]
    fn test_from_custom_objects_mixed_blocks() {
        let table = RateTable::from_custom_objects(
            "bonus-points-tiers",
            page(vec![
                json!({ "minCartValue": 0, "maxCartValue": 999, "factor": 1, "addon": 0 }),
                json!([
                    { "minCartValue": 1000, "maxCartValue": 4999, "factor": 2, "addon": 5 },
                    { "minCartValue": 5000, "maxCartValue": 9999, "factor": 3, "addon": 10 }
                ]),
                json!({
                    "b-gold": { "minCartValue": 20000, "maxCartValue": 1000000, "factor": 5, "addon": 50 },
                    "a-silver": { "minCartValue": 10000, "maxCartValue": 19999, "factor": 4, "addon": 20 }
                }),
            ]),
        )
        .unwrap();

        assert_eq!(table.tiers().len(), 5);
        // 命名集合按名称排序：a-silver 在 b-gold 之前
        assert_eq!(table.tiers()[3].factor, 4.0);
        assert_eq!(table.tiers()[4].factor, 5.0);
        assert_eq!(table.compute_earned_points(2000), 45);
    }

    #[test]
    fn test_from_custom_objects_missing_field_is_malformed() {
        let err = RateTable::from_custom_objects(
            "bonus-points-tiers",
            page(vec![json!({ "minCartValue": 0, "maxCartValue": 999, "factor": 1 })]),
        )
        .unwrap_err();
        assert_eq!(err.code(), "RateTableMalformed");
        assert!(err.to_string().contains("tier-0"));
    }

    #[test]
    fn test_from_custom_objects_empty_is_not_found() {
        let err = RateTable::from_custom_objects("bonus-points-tiers", page(vec![])).unwrap_err();
        assert!(matches!(err, PointsError::RateTableNotFound { .. }));

        let err = RateTable::from_custom_objects("bonus-points-tiers", page(vec![json!([])]))
            .unwrap_err();
        assert!(matches!(err, PointsError::RateTableNotFound { .. }));
    }
}
