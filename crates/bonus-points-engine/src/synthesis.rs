//! 更新动作合成
//!
//! 把积分结果转换为平台更新动作。购物车上的积分展示行用固定 slug 识别，
//! 每次重算先删旧行再加新行，保证批量执行后最多只有一行积分展示。

use serde_json::{Map, Value};
use tracing::debug;

use crate::actions::{LocalizedString, ResourceIdentifier, UpdateAction};
use crate::models::{CartSnapshot, CustomLineItem, Money};

/// 默认的积分展示行 slug，不包含积分数值
pub const DEFAULT_LINE_ITEM_SLUG: &str = "bonus-points-earned";
/// 默认的积分自定义类型 key
pub const DEFAULT_CUSTOM_TYPE_KEY: &str = "bonus-points";
/// 默认的积分字段名
pub const DEFAULT_POINTS_FIELD: &str = "points";

/// 积分动作合成配置
#[derive(Debug, Clone)]
pub struct AwardSettings {
    pub custom_type_key: String,
    pub points_field: String,
    pub line_item_slug: String,
    pub tax_category_key: String,
    /// 英文展示名模板，`{points}` 会被替换为积分数
    pub name_en: String,
    /// 德文展示名模板
    pub name_de: String,
}

impl Default for AwardSettings {
    fn default() -> Self {
        Self {
            custom_type_key: DEFAULT_CUSTOM_TYPE_KEY.to_string(),
            points_field: DEFAULT_POINTS_FIELD.to_string(),
            line_item_slug: DEFAULT_LINE_ITEM_SLUG.to_string(),
            tax_category_key: "standard".to_string(),
            name_en: "You earned {points} bonus points".to_string(),
            name_de: "Sie erhalten {points} Bonuspunkte".to_string(),
        }
    }
}

impl AwardSettings {
    pub fn display_name(&self, points: u64) -> LocalizedString {
        let points = points.to_string();
        LocalizedString::new()
            .with("en", self.name_en.replace("{points}", &points))
            .with("de", self.name_de.replace("{points}", &points))
    }

    fn set_points_action(&self, points: u64) -> UpdateAction {
        let mut fields = Map::new();
        fields.insert(self.points_field.clone(), Value::from(points));
        UpdateAction::SetCustomType {
            type_ref: ResourceIdentifier::by_key("type", &self.custom_type_key),
            fields,
        }
    }
}

/// 合成购物车更新动作
///
/// 顺序固定：删除旧展示行（如有） -> 新增展示行 -> 写入临时积分字段。
/// 积分为 0 时返回空列表。
pub fn synthesize_cart_actions(
    cart: &CartSnapshot,
    earned_points: u64,
    existing_award_line_item: Option<&CustomLineItem>,
    settings: &AwardSettings,
) -> Vec<UpdateAction> {
    if earned_points == 0 {
        return Vec::new();
    }

    let mut actions = Vec::with_capacity(3);

    if let Some(existing) = existing_award_line_item {
        debug!(cart_id = %cart.id, line_item_id = %existing.id, "移除旧的积分展示行");
        actions.push(UpdateAction::RemoveCustomLineItem {
            custom_line_item_id: existing.id.clone(),
        });
    }

    actions.push(UpdateAction::AddCustomLineItem {
        name: settings.display_name(earned_points),
        money: Money::zero(&cart.total_price.currency_code),
        slug: settings.line_item_slug.clone(),
        tax_category: ResourceIdentifier::by_key("tax-category", &settings.tax_category_key),
        quantity: 1,
    });

    actions.push(settings.set_points_action(earned_points));

    actions
}

/// 合成购物车清零动作
///
/// 重算后不再获得积分时，删除旧展示行并把临时积分字段写为 0，
/// 避免订单沿用上一次的预览积分。购物车上没有遗留积分时返回空列表。
pub fn synthesize_cart_clear_actions(
    cart: &CartSnapshot,
    existing_award_line_item: Option<&CustomLineItem>,
    settings: &AwardSettings,
) -> Vec<UpdateAction> {
    if existing_award_line_item.is_none() && !cart.has_provisional_points(&settings.points_field) {
        return Vec::new();
    }

    let mut actions = Vec::with_capacity(2);
    if let Some(existing) = existing_award_line_item {
        debug!(cart_id = %cart.id, line_item_id = %existing.id, "积分归零，移除展示行");
        actions.push(UpdateAction::RemoveCustomLineItem {
            custom_line_item_id: existing.id.clone(),
        });
    }
    actions.push(settings.set_points_action(0));
    actions
}

/// 合成顾客更新动作，写入的是合并后的总积分
pub fn synthesize_customer_actions(total_points: u64, settings: &AwardSettings) -> Vec<UpdateAction> {
    vec![settings.set_points_action(total_points)]
}
