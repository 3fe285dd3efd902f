//! 平台 GraphQL 客户端
//!
//! 所有读写都经由 `{api_url}/{project_key}/graphql`，鉴权由 [`TokenProvider`] 负责。
//! GraphQL 响应中的 wire 结构在本模块内转换为引擎的快照类型，引擎本身不感知 GraphQL。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bonus_points::{
    CartSnapshot, CustomFields, CustomLineItem, CustomObjectEntry, CustomObjectsPage, CustomerCustom,
    CustomerSnapshot, Money, PointsError, RawCustomField, UpdateAction,
};
use bonus_points::models::TypeReference;
use loyalty_shared::config::CommerceConfig;
use loyalty_shared::observability::{metrics, tracing as otel};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use super::{CommerceClient, TokenProvider};

/// 自定义对象每页读取数量（平台上限 500）
const CUSTOM_OBJECTS_LIMIT: usize = 500;

const CUSTOMER_QUERY: &str = r#"
query Customer($id: String!) {
  customer(id: $id) {
    id
    version
    custom {
      type { key }
      customFieldsRaw { name value }
    }
  }
}"#;

const CART_QUERY: &str = r#"
query Cart($id: String!) {
  cart(id: $id) {
    id
    version
    customerId
    totalPrice { currencyCode centAmount }
    customLineItems { id slug }
    custom {
      type { key }
      customFieldsRaw { name value }
    }
  }
}"#;

const CUSTOM_OBJECTS_QUERY: &str = r#"
query RateTable($container: String!, $limit: Int!, $offset: Int!) {
  customObjects(container: $container, limit: $limit, offset: $offset) {
    total
    results { key value }
  }
}"#;

const UPDATE_CUSTOMER_MUTATION: &str = r#"
mutation UpdateCustomer($id: String!, $version: Long!, $actions: [CustomerUpdateAction!]!) {
  updateCustomer(id: $id, version: $version, actions: $actions) {
    id
    version
  }
}"#;

// ---------------------------------------------------------------------------
// GraphQL wire 结构
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorExtensions {
    code: Option<String>,
}

impl GraphQlError {
    fn code(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|e| e.code.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTypeKey {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCustom {
    #[serde(rename = "type")]
    type_key: Option<WireTypeKey>,
    #[serde(default)]
    custom_fields_raw: Vec<RawCustomField>,
}

impl WireCustom {
    fn key(&self) -> Option<String> {
        self.type_key.as_ref().and_then(|t| t.key.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CustomerData {
    customer: Option<WireCustomer>,
}

#[derive(Debug, Deserialize)]
struct WireCustomer {
    id: String,
    version: i64,
    custom: Option<WireCustom>,
}

impl From<WireCustomer> for CustomerSnapshot {
    fn from(wire: WireCustomer) -> Self {
        let custom = wire.custom.map(|custom| CustomerCustom {
            type_key: custom.key(),
            custom_fields_raw: custom.custom_fields_raw,
        });
        CustomerSnapshot {
            id: wire.id,
            version: wire.version,
            custom,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CartData {
    cart: Option<WireCart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCart {
    id: String,
    version: i64,
    customer_id: Option<String>,
    total_price: Money,
    #[serde(default)]
    custom_line_items: Vec<CustomLineItem>,
    custom: Option<WireCustom>,
}

impl From<WireCart> for CartSnapshot {
    fn from(wire: WireCart) -> Self {
        let custom = wire.custom.map(|custom| {
            let type_ref = custom.key().map(|key| TypeReference {
                type_id: "type".to_string(),
                id: None,
                key: Some(key),
            });
            let fields: Map<String, Value> = custom
                .custom_fields_raw
                .into_iter()
                .map(|f| (f.name, f.value))
                .collect();
            CustomFields { type_ref, fields }
        });
        CartSnapshot {
            id: wire.id,
            version: wire.version,
            total_price: wire.total_price,
            customer_id: wire.customer_id,
            custom_line_items: wire.custom_line_items,
            custom,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomObjectsData {
    custom_objects: WireCustomObjects,
}

#[derive(Debug, Deserialize)]
struct WireCustomObjects {
    total: usize,
    #[serde(default)]
    results: Vec<CustomObjectEntry>,
}

/// 判断是否还需要继续翻页
///
/// 平台报告的总数多于已读取数量、但本页为空时说明数据不完整，直接报错。
fn needs_next_page(
    container: &str,
    fetched: usize,
    page_len: usize,
    total: usize,
) -> Result<bool, PointsError> {
    if fetched >= total {
        return Ok(false);
    }
    if page_len == 0 {
        return Err(PointsError::GraphQLQueryFailed(format!(
            "customObjects: container {container} 共 {total} 条，仅读取到 {fetched} 条"
        )));
    }
    Ok(true)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCustomerData {
    update_customer: Option<UpdatedResource>,
}

#[derive(Debug, Deserialize)]
struct UpdatedResource {
    version: i64,
}

/// GraphQL 的 CustomFieldInput：value 为 JSON 编码后的字符串
#[derive(Debug, Serialize)]
struct CustomFieldInput {
    name: String,
    value: String,
}

/// 将更新动作转换为 GraphQL CustomerUpdateAction 输入
///
/// 顾客更新只会产生 setCustomType，其余动作属于购物车。
fn customer_action_input(action: &UpdateAction) -> Result<Value, PointsError> {
    match action {
        UpdateAction::SetCustomType { type_ref, fields } => {
            let fields: Vec<CustomFieldInput> = fields
                .iter()
                .map(|(name, value)| CustomFieldInput {
                    name: name.clone(),
                    value: value.to_string(),
                })
                .collect();
            Ok(json!({
                "setCustomType": {
                    "type": type_ref,
                    "fields": fields,
                }
            }))
        }
        other => Err(PointsError::InvalidOperation(format!(
            "顾客更新不支持动作 {}",
            other.name()
        ))),
    }
}

/// 写入冲突时的上下文，用于生成 ConcurrentModification 错误
struct ConflictContext<'a> {
    resource: &'a str,
    version: i64,
}

fn classify_errors(
    operation: &str,
    errors: Vec<GraphQlError>,
    conflict: Option<&ConflictContext<'_>>,
) -> PointsError {
    if let Some(ctx) = conflict
        && errors.iter().any(|e| e.code() == Some("ConcurrentModification"))
    {
        return PointsError::ConcurrentModification {
            resource: ctx.resource.to_string(),
            version: ctx.version,
        };
    }

    let messages: Vec<String> = errors
        .into_iter()
        .map(|e| match e.code() {
            Some(code) => format!("[{code}] {}", e.message),
            None => e.message,
        })
        .collect();
    PointsError::GraphQLQueryFailed(format!("{operation}: {}", messages.join("; ")))
}

// ---------------------------------------------------------------------------
// 客户端实现
// ---------------------------------------------------------------------------

/// 基于 GraphQL 的平台客户端
pub struct GraphQlCommerceClient {
    http: reqwest::Client,
    endpoint: String,
    tokens: TokenProvider,
}

impl GraphQlCommerceClient {
    pub fn new(config: &CommerceConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        let tokens = TokenProvider::new(http.clone(), config);
        Ok(Self {
            http,
            endpoint: config.graphql_endpoint(),
            tokens,
        })
    }

    /// 执行一次 GraphQL 请求
    ///
    /// 遇到 401 会丢弃缓存的令牌并重试一次。
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
        conflict: Option<ConflictContext<'_>>,
    ) -> Result<T, PointsError> {
        let start = Instant::now();
        let result = self
            .send_with_retry(operation, query, &variables)
            .await
            .and_then(|response: GraphQlResponse<T>| {
                if !response.errors.is_empty() {
                    return Err(classify_errors(operation, response.errors, conflict.as_ref()));
                }
                response.data.ok_or_else(|| {
                    PointsError::GraphQLQueryFailed(format!("{operation}: 响应缺少 data"))
                })
            });

        let status = match &result {
            Ok(_) => "ok",
            Err(PointsError::ConcurrentModification { .. }) => "conflict",
            Err(_) => "error",
        };
        metrics::record_graphql_request(operation, status, start.elapsed().as_secs_f64());

        result
    }

    async fn send_with_retry<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: &Value,
    ) -> Result<GraphQlResponse<T>, PointsError> {
        match self.send(operation, query, variables).await {
            Err(SendError::Unauthorized) => {
                warn!(operation, "访问令牌被拒绝，刷新后重试");
                self.tokens.invalidate().await;
                self.send(operation, query, variables)
                    .await
                    .map_err(|e| e.into_points_error(operation))
            }
            other => other.map_err(|e| e.into_points_error(operation)),
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: &Value,
    ) -> Result<GraphQlResponse<T>, SendError> {
        let token = self.tokens.access_token().await.map_err(SendError::Token)?;

        let mut trace_headers = HashMap::new();
        otel::inject_to_headers(&mut trace_headers);

        let mut request = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&json!({ "query": query, "variables": variables }));
        for (name, value) in trace_headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(SendError::Transport)?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SendError::Unauthorized);
        }

        // 平台在 GraphQL 层错误时也可能返回 400，错误详情仍在 body 里
        let body = response.text().await.map_err(SendError::Transport)?;
        match serde_json::from_str::<GraphQlResponse<T>>(&body) {
            Ok(parsed) => {
                debug!(operation, status = %status, "GraphQL 请求完成");
                Ok(parsed)
            }
            Err(e) if status.is_success() => Err(SendError::Decode(e.to_string())),
            Err(_) => Err(SendError::Status(status)),
        }
    }
}

/// 单次发送的失败原因
enum SendError {
    Unauthorized,
    Token(PointsError),
    Transport(reqwest::Error),
    Status(StatusCode),
    Decode(String),
}

impl SendError {
    fn into_points_error(self, operation: &str) -> PointsError {
        match self {
            SendError::Unauthorized => {
                PointsError::GraphQLQueryFailed(format!("{operation}: 鉴权失败"))
            }
            SendError::Token(e) => e,
            SendError::Transport(e) => {
                PointsError::GraphQLQueryFailed(format!("{operation}: 请求失败: {e}"))
            }
            SendError::Status(status) => {
                PointsError::GraphQLQueryFailed(format!("{operation}: HTTP {status}"))
            }
            SendError::Decode(e) => {
                PointsError::GraphQLQueryFailed(format!("{operation}: 响应解析失败: {e}"))
            }
        }
    }
}

#[async_trait]
impl CommerceClient for GraphQlCommerceClient {
    #[instrument(skip(self))]
    async fn fetch_cart(&self, cart_id: &str) -> Result<CartSnapshot, PointsError> {
        let data: CartData = self
            .execute("cart", CART_QUERY, json!({ "id": cart_id }), None)
            .await?;
        data.cart
            .map(CartSnapshot::from)
            .ok_or_else(|| PointsError::CartNotFound(cart_id.to_string()))
    }

    #[instrument(skip(self))]
    async fn fetch_customer(&self, customer_id: &str) -> Result<CustomerSnapshot, PointsError> {
        let data: CustomerData = self
            .execute("customer", CUSTOMER_QUERY, json!({ "id": customer_id }), None)
            .await?;
        data.customer
            .map(CustomerSnapshot::from)
            .ok_or_else(|| PointsError::CustomerNotFound(customer_id.to_string()))
    }

    #[instrument(skip(self))]
    async fn fetch_rate_table(&self, container: &str) -> Result<CustomObjectsPage, PointsError> {
        let mut results = Vec::new();
        loop {
            let data: CustomObjectsData = self
                .execute(
                    "customObjects",
                    CUSTOM_OBJECTS_QUERY,
                    json!({
                        "container": container,
                        "limit": CUSTOM_OBJECTS_LIMIT,
                        "offset": results.len(),
                    }),
                    None,
                )
                .await?;

            let page = data.custom_objects;
            let page_len = page.results.len();
            results.extend(page.results);

            if !needs_next_page(container, results.len(), page_len, page.total)? {
                break;
            }
            debug!(container, fetched = results.len(), total = page.total, "继续读取下一页档位");
        }
        Ok(CustomObjectsPage { results })
    }

    #[instrument(skip(self, actions), fields(action_count = actions.len()))]
    async fn update_customer(
        &self,
        customer_id: &str,
        version: i64,
        actions: &[UpdateAction],
    ) -> Result<i64, PointsError> {
        let inputs = actions
            .iter()
            .map(customer_action_input)
            .collect::<Result<Vec<_>, _>>()?;

        let resource = format!("customer/{customer_id}");
        let data: UpdateCustomerData = self
            .execute(
                "updateCustomer",
                UPDATE_CUSTOMER_MUTATION,
                json!({ "id": customer_id, "version": version, "actions": inputs }),
                Some(ConflictContext {
                    resource: &resource,
                    version,
                }),
            )
            .await?;

        data.update_customer
            .map(|updated| updated.version)
            .ok_or_else(|| PointsError::CustomerNotFound(customer_id.to_string()))
    }

    async fn health_check(&self) -> Result<(), PointsError> {
        self.tokens.access_token().await.map(|_| ())
    }
}
