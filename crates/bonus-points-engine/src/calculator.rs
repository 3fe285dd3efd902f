//! 积分计算统一入口
//!
//! 购物车创建与更新共用同一套算法：
//! - **购物车路径**：预览积分，写入展示行和临时积分字段，不累加余额
//! - **订单路径**：读取临时积分，与顾客历史积分合并后写回顾客
//!
//! 所有输入都是已读取好的快照，这里只做计算。

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::actions::UpdateAction;
use crate::error::Result;
use crate::models::{AwardResult, CartSnapshot, CustomLineItem, CustomerSnapshot, OrderSnapshot};
use crate::reconcile::reconcile_points;
use crate::synthesis::{
    AwardSettings, synthesize_cart_actions, synthesize_cart_clear_actions, synthesize_customer_actions,
};
use crate::tier::RateTable;

/// 有更新动作时的状态码
pub const STATUS_UPDATED: u16 = 200;
/// 空操作时的状态码
pub const STATUS_NO_OP: u16 = 201;

/// 返回给 HTTP 层的扩展响应
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionResponse {
    pub status_code: u16,
    pub actions: Vec<UpdateAction>,
    /// 仅用于日志与指标，不参与序列化
    #[serde(skip)]
    pub award: Option<AwardResult>,
}

impl ExtensionResponse {
    pub fn no_op() -> Self {
        Self {
            status_code: STATUS_NO_OP,
            actions: Vec::new(),
            award: None,
        }
    }

    pub fn with_actions(actions: Vec<UpdateAction>, award: AwardResult) -> Self {
        if actions.is_empty() {
            return Self::no_op();
        }
        Self {
            status_code: STATUS_UPDATED,
            actions,
            award: Some(award),
        }
    }

    pub fn is_no_op(&self) -> bool {
        self.actions.is_empty()
    }
}

/// 订单确认后针对顾客的积分入账
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerAward {
    pub customer_id: String,
    /// 读取时的版本号，写入时必须带上以便平台做乐观锁校验
    pub customer_version: i64,
    pub award: AwardResult,
    pub actions: Vec<UpdateAction>,
}

/// 积分计算器
#[derive(Debug, Clone, Default)]
pub struct BonusPointsCalculator {
    settings: AwardSettings,
}

impl BonusPointsCalculator {
    pub fn new(settings: AwardSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AwardSettings {
        &self.settings
    }

    /// 购物车路径：预览积分并生成购物车更新动作
    ///
    /// 购物车没有关联顾客或顾客未加入积分计划时返回空操作。
    /// 总金额为 0 或没有命中任何档位时，若购物车上还留有上次的积分展示行或
    /// 临时积分，则生成清零动作，否则同样返回空操作。
    #[instrument(skip_all, fields(cart_id = %cart.id))]
    pub fn process_cart(
        &self,
        cart: &CartSnapshot,
        customer: Option<&CustomerSnapshot>,
        rate_table: &RateTable,
    ) -> Result<ExtensionResponse> {
        let Some(customer) = customer else {
            debug!("购物车未关联顾客，跳过积分计算");
            return Ok(ExtensionResponse::no_op());
        };

        // 购物车路径只需要确认加入状态，余额格式不影响预览
        if !customer.is_opted_in(&self.settings.custom_type_key) {
            debug!(customer_id = %customer.id, "顾客未加入积分计划，跳过");
            return Ok(ExtensionResponse::no_op());
        }

        let existing = cart.find_custom_line_item(&self.settings.line_item_slug);

        let Some(total) = cart.billable_total() else {
            debug!("购物车金额为 0");
            return Ok(self.clear_cart_award(cart, existing));
        };

        let earned_points = rate_table.compute_earned_points(total);
        if earned_points == 0 {
            debug!(cart_total = total, "未命中任何积分档位");
            return Ok(self.clear_cart_award(cart, existing));
        }

        let actions = synthesize_cart_actions(cart, earned_points, existing, &self.settings);

        info!(
            cart_total = total,
            earned_points,
            replaced_line_item = existing.is_some(),
            "购物车积分预览完成"
        );

        Ok(ExtensionResponse::with_actions(
            actions,
            AwardResult::preview(earned_points),
        ))
    }

    /// 购物车是否留有上次预览写入的积分（展示行或临时字段）
    pub fn cart_has_award(&self, cart: &CartSnapshot) -> bool {
        cart.find_custom_line_item(&self.settings.line_item_slug).is_some()
            || cart.has_provisional_points(&self.settings.points_field)
    }

    fn clear_cart_award(
        &self,
        cart: &CartSnapshot,
        existing: Option<&CustomLineItem>,
    ) -> ExtensionResponse {
        let actions = synthesize_cart_clear_actions(cart, existing, &self.settings);
        if !actions.is_empty() {
            info!(action_count = actions.len(), "购物车不再获得积分，清除旧的积分预览");
        }
        ExtensionResponse::with_actions(actions, AwardResult::preview(0))
    }

    /// 订单路径：合并积分并生成顾客更新动作
    ///
    /// 获得积分优先取购物车阶段写入的临时字段；字段缺失时按订单金额重新计算，
    /// 此时需要调用方提供档位表。返回 `None` 表示无需更新。
    #[instrument(skip_all, fields(order_id = %order.id, customer_id = %customer.id))]
    pub fn process_order(
        &self,
        order: &OrderSnapshot,
        customer: &CustomerSnapshot,
        rate_table: Option<&RateTable>,
    ) -> Result<Option<CustomerAward>> {
        let earned_points = match order.provisional_points(&self.settings.points_field)? {
            Some(points) => points,
            None => match (order.billable_total(), rate_table) {
                (Some(total), Some(table)) => table.compute_earned_points(total),
                (None, _) => 0,
                (Some(_), None) => {
                    warn!("订单缺少临时积分字段且未提供档位表，跳过");
                    0
                }
            },
        };

        if earned_points == 0 {
            debug!("订单未获得积分，跳过");
            return Ok(None);
        }

        let prior = customer.prior_points(&self.settings.custom_type_key, &self.settings.points_field)?;
        let Some(total_points) = reconcile_points(earned_points, prior) else {
            debug!("顾客未加入积分计划，跳过");
            return Ok(None);
        };

        info!(
            earned_points,
            total_points,
            customer_version = customer.version,
            "订单积分合并完成"
        );

        Ok(Some(CustomerAward {
            customer_id: customer.id.clone(),
            customer_version: customer.version,
            award: AwardResult {
                earned_points,
                total_points,
            },
            actions: synthesize_customer_actions(total_points, &self.settings),
        }))
    }

    /// 订单是否需要档位表（缺少临时积分字段时需要按金额重算）
    pub fn order_needs_rate_table(&self, order: &OrderSnapshot) -> Result<bool> {
        Ok(order.provisional_points(&self.settings.points_field)?.is_none()
            && order.billable_total().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::Tier;
    use serde_json::{Value, json};

    fn table() -> RateTable {
        RateTable::new(vec![Tier::new(0.0, 20000.0, 5.0, 10.0)]).unwrap()
    }

    fn cart(total: i64) -> CartSnapshot {
        serde_json::from_value(json!({
            "id": "cart-1",
            "customerId": "customer-1",
            "totalPrice": { "currencyCode": "EUR", "centAmount": total }
        }))
        .unwrap()
    }

    fn customer(custom: Value) -> CustomerSnapshot {
        serde_json::from_value(json!({ "id": "customer-1", "version": 9, "custom": custom })).unwrap()
    }

    fn opted_in(points: Value) -> CustomerSnapshot {
        customer(json!({
            "typeKey": "bonus-points",
            "customFieldsRaw": [{ "name": "points", "value": points }]
        }))
    }

    #[test]
    fn test_process_cart_awards_points() {
        let calculator = BonusPointsCalculator::default();
        let response = calculator
            .process_cart(&cart(10000), Some(&opted_in(json!(100))), &table())
            .unwrap();

        assert_eq!(response.status_code, STATUS_UPDATED);
        assert_eq!(response.actions.len(), 2);
        // 购物车只预览当前积分，不累加顾客余额
        assert_eq!(response.award, Some(AwardResult::preview(510)));
    }

    #[test]
    fn test_process_cart_zero_total_is_no_op() {
        let calculator = BonusPointsCalculator::default();
        let response = calculator
            .process_cart(&cart(0), Some(&opted_in(json!(0))), &table())
            .unwrap();
        assert_eq!(response, ExtensionResponse::no_op());
        assert_eq!(response.status_code, STATUS_NO_OP);
    }

    #[test]
    fn test_process_cart_without_customer_is_no_op() {
        let calculator = BonusPointsCalculator::default();
        let response = calculator.process_cart(&cart(10000), None, &table()).unwrap();
        assert!(response.is_no_op());
    }

    #[test]
    fn test_process_cart_not_opted_in_is_no_op() {
        let calculator = BonusPointsCalculator::default();
        let response = calculator
            .process_cart(&cart(10000), Some(&customer(Value::Null)), &table())
            .unwrap();
        assert!(response.is_no_op());
    }

    #[test]
    fn test_process_cart_no_matching_tier_is_no_op() {
        let calculator = BonusPointsCalculator::default();
        let response = calculator
            .process_cart(&cart(50000), Some(&opted_in(json!(0))), &table())
            .unwrap();
        assert!(response.is_no_op());
    }

    #[test]
    fn test_process_cart_clears_stale_award_when_no_tier_matches() {
        let calculator = BonusPointsCalculator::default();
        let stale: CartSnapshot = serde_json::from_value(json!({
            "id": "cart-1",
            "customerId": "customer-1",
            "totalPrice": { "currencyCode": "EUR", "centAmount": 50000 },
            "customLineItems": [{ "id": "cli-510", "slug": "bonus-points-earned" }],
            "custom": { "fields": { "points": 510 } }
        }))
        .unwrap();

        let response = calculator
            .process_cart(&stale, Some(&opted_in(json!(0))), &table())
            .unwrap();

        assert_eq!(response.status_code, STATUS_UPDATED);
        assert_eq!(
            serde_json::to_value(&response.actions).unwrap(),
            json!([
                { "action": "removeCustomLineItem", "customLineItemId": "cli-510" },
                {
                    "action": "setCustomType",
                    "type": { "typeId": "type", "key": "bonus-points" },
                    "fields": { "points": 0 }
                }
            ])
        );
        assert_eq!(response.award, Some(AwardResult::preview(0)));
    }

    #[test]
    fn test_process_cart_clears_provisional_points_on_zero_total() {
        let calculator = BonusPointsCalculator::default();
        let emptied: CartSnapshot = serde_json::from_value(json!({
            "id": "cart-1",
            "customerId": "customer-1",
            "totalPrice": { "currencyCode": "EUR", "centAmount": 0 },
            "custom": { "fields": { "points": 510 } }
        }))
        .unwrap();
        assert!(calculator.cart_has_award(&emptied));

        let response = calculator
            .process_cart(&emptied, Some(&opted_in(json!(0))), &table())
            .unwrap();

        assert_eq!(response.actions.len(), 1);
        assert_eq!(response.actions[0].name(), "setCustomType");
    }

    #[test]
    fn test_process_cart_ignores_malformed_balance() {
        let calculator = BonusPointsCalculator::default();
        let response = calculator
            .process_cart(&cart(10000), Some(&opted_in(json!("lots"))), &table())
            .unwrap();
        assert_eq!(response.award, Some(AwardResult::preview(510)));
    }

    #[test]
    fn test_process_order_uses_provisional_points() {
        let calculator = BonusPointsCalculator::default();
        let order: OrderSnapshot = serde_json::from_value(json!({
            "id": "order-1",
            "customerId": "customer-1",
            "totalPrice": { "currencyCode": "EUR", "centAmount": 10000 },
            "custom": { "fields": { "points": 300 } }
        }))
        .unwrap();

        assert!(!calculator.order_needs_rate_table(&order).unwrap());

        let award = calculator
            .process_order(&order, &opted_in(json!(1200)), None)
            .unwrap()
            .unwrap();

        assert_eq!(award.customer_version, 9);
        assert_eq!(
            award.award,
            AwardResult {
                earned_points: 300,
                total_points: 1500
            }
        );
    }

    #[test]
    fn test_process_order_falls_back_to_rate_table() {
        let calculator = BonusPointsCalculator::default();
        let order: OrderSnapshot = serde_json::from_value(json!({
            "id": "order-1",
            "totalPrice": { "currencyCode": "EUR", "centAmount": 10000 }
        }))
        .unwrap();

        assert!(calculator.order_needs_rate_table(&order).unwrap());

        let unset = customer(json!({ "typeKey": "bonus-points", "customFieldsRaw": [] }));
        let award = calculator
            .process_order(&order, &unset, Some(&table()))
            .unwrap()
            .unwrap();
        assert_eq!(award.award.total_points, 510);

        assert!(calculator.process_order(&order, &unset, None).unwrap().is_none());
    }

    #[test]
    fn test_process_order_not_opted_in() {
        let calculator = BonusPointsCalculator::default();
        let order: OrderSnapshot = serde_json::from_value(json!({
            "id": "order-1",
            "totalPrice": { "currencyCode": "EUR", "centAmount": 10000 },
            "custom": { "fields": { "points": 300 } }
        }))
        .unwrap();
        let award = calculator
            .process_order(&order, &customer(Value::Null), None)
            .unwrap();
        assert!(award.is_none());
    }
}
