//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use std::fmt;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::observability::ObservabilityConfig;

/// 服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 单个请求的处理超时
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_seconds: 30,
        }
    }
}

/// 电商平台 API 配置
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct CommerceConfig {
    pub project_key: String,
    pub api_url: String,
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// OAuth scope，多个以空格分隔；为空时使用 API 客户端的默认 scope
    pub scopes: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            project_key: "loyalty-dev".to_string(),
            api_url: "https://api.europe-west1.gcp.commercetools.com".to_string(),
            auth_url: "https://auth.europe-west1.gcp.commercetools.com".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            scopes: None,
            request_timeout_seconds: 10,
        }
    }
}

// client_secret 不能出现在日志里
impl fmt::Debug for CommerceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommerceConfig")
            .field("project_key", &self.project_key)
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("scopes", &self.scopes)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl CommerceConfig {
    /// GraphQL 端点：{api_url}/{project_key}/graphql
    pub fn graphql_endpoint(&self) -> String {
        format!(
            "{}/{}/graphql",
            self.api_url.trim_end_matches('/'),
            self.project_key
        )
    }

    /// OAuth token 端点
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth/token", self.auth_url.trim_end_matches('/'))
    }
}

/// 积分计划配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoyaltyConfig {
    /// 积分档位所在的自定义对象 container
    pub rate_table_container: String,
    pub custom_type_key: String,
    pub points_field: String,
    pub line_item_slug: String,
    pub tax_category_key: String,
    /// 档位重叠时的优先级：last_defined / first_defined / most_specific
    pub tier_priority: String,
    /// 积分展示行英文名，`{points}` 为占位符
    pub name_en: String,
    pub name_de: String,
    /// 扩展调用方需在 `x-extension-secret` 头中携带的共享密钥；为空则不校验
    pub extension_secret: Option<String>,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            rate_table_container: "bonus-points-tiers".to_string(),
            custom_type_key: "bonus-points".to_string(),
            points_field: "points".to_string(),
            line_item_slug: "bonus-points-earned".to_string(),
            tax_category_key: "standard".to_string(),
            tier_priority: "last_defined".to_string(),
            name_en: "You earned {points} bonus points".to_string(),
            name_de: "Sie erhalten {points} Bonuspunkte".to_string(),
            extension_secret: None,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    pub observability: ObservabilityConfig,
    pub commerce: CommerceConfig,
    pub loyalty: LoyaltyConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（LOYALTY_ 前缀，`__` 分隔层级，如 LOYALTY_COMMERCE__CLIENT_ID -> commerce.client_id）
    /// 5. 服务端口环境变量（如 LOYALTY_EXTENSION_PORT）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        // 本地开发时从 .env 读取，文件不存在不算错误
        let _ = dotenvy::dotenv();

        let env = std::env::var("LOYALTY_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("LOYALTY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        if let Some(port) = Self::get_service_port_from_env(service_name) {
            config.server.port = port;
        }

        Ok(config)
    }

    /// 从环境变量获取服务特定端口
    ///
    /// - loyalty-extension-service -> LOYALTY_EXTENSION_PORT
    /// - 其他服务：服务名转大写下划线 + _PORT
    fn get_service_port_from_env(service_name: &str) -> Option<u16> {
        let env_var_name = match service_name {
            "loyalty-extension-service" => "LOYALTY_EXTENSION_PORT".to_string(),
            _ => format!("{}_PORT", service_name.to_uppercase().replace('-', "_")),
        };

        std::env::var(env_var_name)
            .ok()
            .and_then(|v| v.parse().ok())
    }

    /// 获取服务地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
