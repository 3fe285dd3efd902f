//! 资源快照模型
//!
//! 每次调用时由外部读取结果构造，只读，调用结束即丢弃。
//! 字段命名与平台 JSON 保持一致（camelCase），未知字段直接忽略。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PointsError, Result};
use crate::reconcile::PriorPoints;

/// 金额（最小货币单位）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub currency_code: String,
    pub cent_amount: i64,
}

impl Money {
    /// 同币种的零金额，用于积分展示行
    pub fn zero(currency_code: impl Into<String>) -> Self {
        Self {
            currency_code: currency_code.into(),
            cent_amount: 0,
        }
    }
}

/// 资源类型引用（REST 形态）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeReference {
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// 自定义字段（REST 形态：fields 为对象）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomFields {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<TypeReference>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl CustomFields {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// 自定义行项目，只关心识别所需的 id 与 slug
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomLineItem {
    pub id: String,
    pub slug: String,
}

/// 购物车快照
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub id: String,
    #[serde(default)]
    pub version: i64,
    pub total_price: Money,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub custom_line_items: Vec<CustomLineItem>,
    #[serde(default)]
    pub custom: Option<CustomFields>,
}

impl CartSnapshot {
    /// 按 slug 查找已存在的积分展示行
    pub fn find_custom_line_item(&self, slug: &str) -> Option<&CustomLineItem> {
        self.custom_line_items.iter().find(|item| item.slug == slug)
    }

    /// 可计算积分的总金额；零或负数返回 None
    pub fn billable_total(&self) -> Option<u64> {
        u64::try_from(self.total_price.cent_amount)
            .ok()
            .filter(|total| *total > 0)
    }

    /// 临时积分字段是否存在且非零（格式不对也算，需要被清零）
    pub fn has_provisional_points(&self, field: &str) -> bool {
        self.custom
            .as_ref()
            .and_then(|c| c.field(field))
            .is_some_and(|value| !value.is_null() && points_from_value(value) != Some(0))
    }
}

/// 订单快照
///
/// 订单由购物车转换而来，购物车阶段写入的临时积分字段会随之保留。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub id: String,
    #[serde(default)]
    pub version: i64,
    pub total_price: Money,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub custom: Option<CustomFields>,
}

impl OrderSnapshot {
    /// 读取购物车阶段记录的临时积分
    ///
    /// 字段缺失返回 `Ok(None)`；存在但不是非负整数视为数据错误。
    pub fn provisional_points(&self, field: &str) -> Result<Option<u64>> {
        let Some(value) = self.custom.as_ref().and_then(|c| c.field(field)) else {
            return Ok(None);
        };
        points_from_value(value)
            .map(Some)
            .ok_or_else(|| PointsError::OrderMalformed {
                order_id: self.id.clone(),
                message: format!("{} 字段不是非负整数: {}", field, value),
            })
    }

    pub fn billable_total(&self) -> Option<u64> {
        u64::try_from(self.total_price.cent_amount)
            .ok()
            .filter(|total| *total > 0)
    }
}

/// GraphQL customFieldsRaw 中的单个字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCustomField {
    pub name: String,
    pub value: Value,
}

/// GraphQL 形态的顾客自定义字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCustom {
    /// 已分配的自定义类型 key（查询未请求时为空）
    #[serde(default)]
    pub type_key: Option<String>,
    #[serde(default)]
    pub custom_fields_raw: Vec<RawCustomField>,
}

/// 顾客快照
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    pub id: String,
    pub version: i64,
    #[serde(default)]
    pub custom: Option<CustomerCustom>,
}

impl CustomerSnapshot {
    /// 解析顾客的历史积分
    ///
    /// - 未分配任何自定义类型，或分配的不是积分类型 -> `NotOptedIn`
    /// - 已分配积分类型但字段未设置 -> `Unset`
    /// - 字段存在 -> `Balance`
    pub fn prior_points(&self, type_key: &str, field: &str) -> Result<PriorPoints> {
        let Some(custom) = self.custom.as_ref().filter(|_| self.is_opted_in(type_key)) else {
            return Ok(PriorPoints::NotOptedIn);
        };

        let Some(raw) = custom.custom_fields_raw.iter().find(|f| f.name == field) else {
            return Ok(PriorPoints::Unset);
        };

        if raw.value.is_null() {
            return Ok(PriorPoints::Unset);
        }

        points_from_value(&raw.value)
            .map(PriorPoints::Balance)
            .ok_or_else(|| PointsError::CustomerMalformed {
                customer_id: self.id.clone(),
                message: format!("{} 字段不是非负整数: {}", field, raw.value),
            })
    }
}

impl CustomerSnapshot {
    /// 是否已加入积分计划，不读取余额字段
    pub fn is_opted_in(&self, type_key: &str) -> bool {
        match &self.custom {
            None => false,
            Some(custom) => custom
                .type_key
                .as_deref()
                .is_none_or(|assigned| assigned == type_key),
        }
    }
}

/// 单次计算的积分结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardResult {
    /// 当前购物车/订单获得的积分
    pub earned_points: u64,
    /// 购物车预览时等于 earned_points；订单确认时为合并后的总积分
    pub total_points: u64,
}

impl AwardResult {
    pub fn preview(earned_points: u64) -> Self {
        Self {
            earned_points,
            total_points: earned_points,
        }
    }
}

/// 积分字段可能以整数或整值浮点数形式存储
fn points_from_value(value: &Value) -> Option<u64> {
    if let Some(points) = value.as_u64() {
        return Some(points);
    }
    value
        .as_f64()
        .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64)
        .map(|v| v as u64)
}
