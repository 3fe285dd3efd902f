//! 请求/响应 DTO
//!
//! 请求体是平台定义的 API extension 与 subscription 消息格式，
//! 只声明积分计算用得到的字段，其余字段忽略。

use bonus_points::{OrderSnapshot, UpdateAction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API extension 调用的资源类型
pub const CART_TYPE_ID: &str = "cart";

/// 触发积分合并的消息类型
pub const ORDER_CREATED: &str = "OrderCreated";

/// API extension 请求体
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRequest {
    /// Create / Update
    pub action: String,
    pub resource: ExtensionResource,
}

/// 触发扩展的资源引用，`obj` 为平台展开后的完整资源
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionResource {
    pub type_id: String,
    pub id: String,
    #[serde(default)]
    pub obj: Option<Value>,
}

impl ExtensionRequest {
    /// 只接受购物车的 Create/Update
    pub fn is_cart_trigger(&self) -> bool {
        matches!(self.action.as_str(), "Create" | "Update") && self.resource.type_id == CART_TYPE_ID
    }
}

/// Subscription 推送的消息
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionMessage {
    #[serde(default)]
    pub notification_type: Option<String>,
    /// 消息类型，如 OrderCreated
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub resource: Option<MessageResource>,
    /// OrderCreated 消息携带的订单
    #[serde(default)]
    pub order: Option<OrderSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResource {
    pub type_id: String,
    pub id: String,
}

impl SubscriptionMessage {
    pub fn is_order_created(&self) -> bool {
        self.message_type == ORDER_CREATED
    }
}

/// 扩展/订阅响应体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionsBody {
    pub actions: Vec<UpdateAction>,
}

impl ActionsBody {
    pub fn new(actions: Vec<UpdateAction>) -> Self {
        Self { actions }
    }
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extension_request_parse() {
        let request: ExtensionRequest = serde_json::from_value(json!({
            "action": "Update",
            "resource": {
                "typeId": "cart",
                "id": "cart-1",
                "obj": { "id": "cart-1", "totalPrice": { "currencyCode": "EUR", "centAmount": 100 } }
            }
        }))
        .unwrap();

        assert!(request.is_cart_trigger());
        assert_eq!(request.resource.id, "cart-1");
        assert!(request.resource.obj.is_some());
    }

    #[test]
    fn test_non_cart_trigger() {
        let request: ExtensionRequest = serde_json::from_value(json!({
            "action": "Create",
            "resource": { "typeId": "order", "id": "o-1" }
        }))
        .unwrap();
        assert!(!request.is_cart_trigger());

        let request: ExtensionRequest = serde_json::from_value(json!({
            "action": "Delete",
            "resource": { "typeId": "cart", "id": "c-1" }
        }))
        .unwrap();
        assert!(!request.is_cart_trigger());
    }

    #[test]
    fn test_order_created_message_parse() {
        let message: SubscriptionMessage = serde_json::from_value(json!({
            "notificationType": "Message",
            "type": "OrderCreated",
            "resource": { "typeId": "order", "id": "o-1" },
            "resourceVersion": 1,
            "order": {
                "id": "o-1",
                "version": 1,
                "customerId": "c-1",
                "totalPrice": { "currencyCode": "EUR", "centAmount": 10000 }
            }
        }))
        .unwrap();

        assert!(message.is_order_created());
        assert_eq!(message.order.unwrap().customer_id.as_deref(), Some("c-1"));
    }

    #[test]
    fn test_actions_body_shape() {
        let body = serde_json::to_value(ActionsBody::default()).unwrap();
        assert_eq!(body, json!({ "actions": [] }));
    }
}
