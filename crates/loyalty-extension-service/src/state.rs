//! 应用状态定义

use std::sync::Arc;

use crate::service::LoyaltyService;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LoyaltyService>,
    /// 入站共享密钥；为空时不校验
    pub extension_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: Arc<LoyaltyService>) -> Self {
        Self {
            service,
            extension_secret: None,
        }
    }

    pub fn with_extension_secret(mut self, secret: Option<String>) -> Self {
        self.extension_secret = secret.filter(|s| !s.is_empty()).map(Arc::from);
        self
    }
}
