//! HTTP 请求处理器

pub mod extension;
pub mod health;
pub mod subscription;
