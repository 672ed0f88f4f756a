use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 需要轮换的服务令牌条目
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationDueDto {
    pub service_name: String,
    pub secret_id: String,
    pub last_used: DateTime<Utc>,
    pub rotation_due: DateTime<Utc>,
}

/// 各已知服务是否已配置令牌（布尔值，绝不含令牌本身）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStateDto {
    #[serde(flatten)]
    pub states: HashMap<String, bool>,
}
