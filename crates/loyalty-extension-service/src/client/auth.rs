//! OAuth2 client credentials 令牌获取
//!
//! 令牌在进程内缓存，过期前 60 秒刷新（有效期很短的令牌在过半时刷新）。
//! 这是服务里唯一跨请求共享的可变状态。

use std::time::{Duration, Instant};

use bonus_points::PointsError;
use loyalty_shared::config::CommerceConfig;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 提前刷新的窗口
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// 令牌有效期上限，防止异常的 expires_in 导致时间计算溢出
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 24 * 3600);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn new(access_token: String, expires_in: u64, issued_at: Instant) -> Self {
        let lifetime = Duration::from_secs(expires_in).min(MAX_TOKEN_LIFETIME);
        let margin = REFRESH_MARGIN.min(lifetime / 2);
        let refresh_at = issued_at
            .checked_add(lifetime - margin)
            .unwrap_or(issued_at);
        Self {
            access_token,
            refresh_at,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

/// 访问令牌提供者
pub struct TokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scopes: Option<String>,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, config: &CommerceConfig) -> Self {
        Self {
            http,
            token_url: config.token_endpoint(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes: config.scopes.clone(),
            cached: RwLock::new(None),
        }
    }

    /// 获取有效的访问令牌，必要时刷新
    pub async fn access_token(&self) -> Result<String, PointsError> {
        if let Some(token) = self.cached.read().await.as_ref()
            && token.is_fresh(Instant::now())
        {
            return Ok(token.access_token.clone());
        }

        let mut cached = self.cached.write().await;
        // 等待写锁期间可能已被其他请求刷新
        if let Some(token) = cached.as_ref()
            && token.is_fresh(Instant::now())
        {
            return Ok(token.access_token.clone());
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// 丢弃缓存的令牌（收到 401 后调用）
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
        debug!("访问令牌已失效");
    }

    async fn request_token(&self) -> Result<CachedToken, PointsError> {
        let mut form = vec![("grant_type", "client_credentials")];
        if let Some(scopes) = self.scopes.as_deref() {
            form.push(("scope", scopes));
        }

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&form)
            .send()
            .await
            .map_err(|e| PointsError::GraphQLQueryFailed(format!("令牌请求失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "令牌请求被拒绝");
            return Err(PointsError::GraphQLQueryFailed(format!(
                "令牌请求被拒绝: HTTP {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PointsError::GraphQLQueryFailed(format!("令牌响应解析失败: {e}")))?;

        info!(expires_in = token.expires_in, "已获取新的访问令牌");

        Ok(CachedToken::new(
            token.access_token,
            token.expires_in,
            Instant::now(),
        ))
    }
}
