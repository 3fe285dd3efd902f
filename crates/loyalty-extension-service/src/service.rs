//! 积分服务
//!
//! 串联平台读取与引擎计算：读取购物车/订单相关的顾客与档位表，调用
//! [`BonusPointsCalculator`]，订单路径再把合并后的积分写回顾客。
//! 同一次调用内读写顺序执行，写入携带读取时的版本号。

use std::sync::Arc;

use bonus_points::{
    BonusPointsCalculator, CartSnapshot, CustomerAward, CustomerSnapshot, ExtensionResponse,
    PointsError, PriorPoints, RateTable, TierPriority,
};
use loyalty_shared::observability::metrics;
use tracing::{debug, info, instrument, warn};

use crate::client::CommerceClient;
use crate::dto::{ExtensionRequest, SubscriptionMessage};
use crate::error::ExtensionError;

const CART_PATH: &str = "cart";
const ORDER_PATH: &str = "order";

/// 积分服务
pub struct LoyaltyService {
    client: Arc<dyn CommerceClient>,
    calculator: BonusPointsCalculator,
    rate_table_container: String,
    tier_priority: TierPriority,
}

impl LoyaltyService {
    pub fn new(
        client: Arc<dyn CommerceClient>,
        calculator: BonusPointsCalculator,
        rate_table_container: impl Into<String>,
        tier_priority: TierPriority,
    ) -> Self {
        Self {
            client,
            calculator,
            rate_table_container: rate_table_container.into(),
            tier_priority,
        }
    }

    /// 处理购物车 API extension 调用
    #[instrument(skip_all, fields(cart_id = %request.resource.id, action = %request.action))]
    pub async fn handle_cart_extension(
        &self,
        request: ExtensionRequest,
    ) -> Result<ExtensionResponse, ExtensionError> {
        let result = self.compute_cart(request).await;

        match &result {
            Ok(response) => match response.award {
                Some(award) if award.earned_points > 0 => {
                    metrics::record_points_award(CART_PATH, "awarded", Some(award.earned_points))
                }
                Some(_) => metrics::record_points_award(CART_PATH, "cleared", None),
                None => metrics::record_points_award(CART_PATH, "skipped", None),
            },
            Err(_) => metrics::record_points_award(CART_PATH, "failed", None),
        }

        result
    }

    async fn compute_cart(
        &self,
        request: ExtensionRequest,
    ) -> Result<ExtensionResponse, ExtensionError> {
        if !request.is_cart_trigger() {
            return Err(PointsError::InvalidOperation(format!(
                "{} {}",
                request.action, request.resource.type_id
            ))
            .into());
        }

        let cart = match request.resource.obj {
            Some(obj) => serde_json::from_value::<CartSnapshot>(obj)
                .map_err(|e| ExtensionError::BadRequest(format!("购物车数据无法解析: {e}")))?,
            None => {
                debug!("扩展请求未携带购物车，改为查询");
                self.client.fetch_cart(&request.resource.id).await?
            }
        };

        let Some(customer_id) = cart.customer_id.as_deref() else {
            debug!("购物车未关联顾客");
            return Ok(ExtensionResponse::no_op());
        };

        // 零金额且没有遗留积分时无需任何读取；有遗留时仍要走完整流程把它清掉
        if cart.billable_total().is_none() && !self.calculator.cart_has_award(&cart) {
            debug!("购物车金额为 0");
            return Ok(ExtensionResponse::no_op());
        }

        let customer = self.client.fetch_customer(customer_id).await?;
        if !customer.is_opted_in(&self.calculator.settings().custom_type_key) {
            debug!(customer_id, "顾客未加入积分计划");
            return Ok(ExtensionResponse::no_op());
        }

        let rate_table = self.load_rate_table().await?;
        Ok(self
            .calculator
            .process_cart(&cart, Some(&customer), &rate_table)?)
    }

    /// 处理订阅消息，返回已写入顾客的积分结果
    ///
    /// 非 OrderCreated 消息、无顾客订单、零积分均返回 `None`。
    #[instrument(skip_all, fields(message_type = %message.message_type))]
    pub async fn handle_order_message(
        &self,
        message: SubscriptionMessage,
    ) -> Result<Option<CustomerAward>, PointsError> {
        if !message.is_order_created() {
            debug!("忽略非订单创建消息");
            return Ok(None);
        }

        let result = self.award_order(message).await;

        match &result {
            Ok(Some(award)) => {
                metrics::record_points_award(ORDER_PATH, "awarded", Some(award.award.earned_points))
            }
            Ok(None) => metrics::record_points_award(ORDER_PATH, "skipped", None),
            Err(PointsError::ConcurrentModification { .. }) => {
                metrics::record_points_award(ORDER_PATH, "conflict", None)
            }
            Err(_) => metrics::record_points_award(ORDER_PATH, "failed", None),
        }

        result
    }

    async fn award_order(
        &self,
        message: SubscriptionMessage,
    ) -> Result<Option<CustomerAward>, PointsError> {
        let order = message.order.ok_or_else(|| {
            PointsError::InvalidOperation("OrderCreated 消息缺少 order".to_string())
        })?;

        let Some(customer_id) = order.customer_id.as_deref() else {
            debug!(order_id = %order.id, "订单未关联顾客");
            return Ok(None);
        };

        let customer = self.client.fetch_customer(customer_id).await?;
        if self.prior_points(&customer)? == PriorPoints::NotOptedIn {
            debug!(customer_id, "顾客未加入积分计划");
            return Ok(None);
        }

        let rate_table = if self.calculator.order_needs_rate_table(&order)? {
            Some(self.load_rate_table().await?)
        } else {
            None
        };

        let Some(award) = self
            .calculator
            .process_order(&order, &customer, rate_table.as_ref())?
        else {
            return Ok(None);
        };

        let new_version = self
            .client
            .update_customer(&award.customer_id, award.customer_version, &award.actions)
            .await
            .inspect_err(|e| {
                if matches!(e, PointsError::ConcurrentModification { .. }) {
                    warn!(customer_id, version = award.customer_version, "顾客版本冲突");
                }
            })?;

        info!(
            order_id = %order.id,
            customer_id,
            earned_points = award.award.earned_points,
            total_points = award.award.total_points,
            new_version,
            "订单积分已写入顾客"
        );

        Ok(Some(award))
    }

    /// 就绪检查
    pub async fn ready(&self) -> Result<(), PointsError> {
        self.client.health_check().await
    }

    fn prior_points(&self, customer: &CustomerSnapshot) -> Result<PriorPoints, PointsError> {
        let settings = self.calculator.settings();
        customer.prior_points(&settings.custom_type_key, &settings.points_field)
    }

    async fn load_rate_table(&self) -> Result<RateTable, PointsError> {
        let page = self
            .client
            .fetch_rate_table(&self.rate_table_container)
            .await?;
        let table = RateTable::from_custom_objects(&self.rate_table_container, page)?
            .with_priority(self.tier_priority);
        debug!(tiers = table.tiers().len(), priority = %self.tier_priority, "档位表已加载");
        Ok(table)
    }
}
