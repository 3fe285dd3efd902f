//! 平台更新动作
//!
//! 序列化结果直接作为扩展响应或资源更新请求中的 `actions` 数组，
//! 平台按数组顺序原子地执行。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::Money;

/// 多语言文本，键为语言代码（en、de）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedString(pub BTreeMap<String, String>);

impl LocalizedString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locale: impl Into<String>, text: impl Into<String>) -> Self {
        self.0.insert(locale.into(), text.into());
        self
    }

    pub fn get(&self, locale: &str) -> Option<&str> {
        self.0.get(locale).map(String::as_str)
    }
}

/// 资源标识（按 key 或 id 引用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentifier {
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ResourceIdentifier {
    pub fn by_key(type_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            key: Some(key.into()),
            id: None,
        }
    }
}

/// 更新动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum UpdateAction {
    #[serde(rename_all = "camelCase")]
    RemoveCustomLineItem { custom_line_item_id: String },

    #[serde(rename_all = "camelCase")]
    AddCustomLineItem {
        name: LocalizedString,
        money: Money,
        slug: String,
        tax_category: ResourceIdentifier,
        quantity: u32,
    },

    SetCustomType {
        #[serde(rename = "type")]
        type_ref: ResourceIdentifier,
        fields: Map<String, Value>,
    },
}

impl UpdateAction {
    /// 动作名称，与序列化后的 `action` 字段一致
    pub fn name(&self) -> &'static str {
        match self {
            Self::RemoveCustomLineItem { .. } => "removeCustomLineItem",
            Self::AddCustomLineItem { .. } => "addCustomLineItem",
            Self::SetCustomType { .. } => "setCustomType",
        }
    }
}
