use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::models::rotation;

/// 密钥类型，决定轮换间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    ApiKey,
    JwtSecret,
    EncryptionKey,
    Database,
    Oauth,
    SshKey,
    Token,
}

impl std::fmt::Display for SecretType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            SecretType::ApiKey => "api_key",
            SecretType::JwtSecret => "jwt_secret",
            SecretType::EncryptionKey => "encryption_key",
            SecretType::Database => "database",
            SecretType::Oauth => "oauth",
            SecretType::SshKey => "ssh_key",
            SecretType::Token => "token",
        };
        write!(f, "{}", tag)
    }
}

/// 加密后的负载，三个字段均为十六进制编码
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedData {
    pub encrypted: String,
    pub iv: String,
    #[serde(rename = "authTag")]
    pub auth_tag: String,
}

/// 单次轮换的历史记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationEvent {
    pub rotated_at: DateTime<Utc>,
    pub previous_rotation_due: DateTime<Utc>,
}

/// 密钥的元数据，不含任何明文或密文
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub usage_count: u64,
    pub rotation_due: DateTime<Utc>,
    #[serde(default)]
    pub rotation_history: Vec<RotationEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_from: Option<String>,
}

impl SecretMetadata {
    fn new(secret_type: SecretType, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            last_used: now,
            usage_count: 0,
            rotation_due: now + rotation::rotation_interval(secret_type),
            rotation_history: Vec::new(),
            rotated_to: None,
            rotated_from: None,
        }
    }
}

/// 保险库中的一条加密密钥记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    #[serde(rename = "type")]
    pub secret_type: SecretType,
    pub name: String,
    #[serde(rename = "encryptedData")]
    pub encrypted_data: EncryptedData,
    pub metadata: SecretMetadata,
}

/// 面向调用方的只读摘要，绝不携带密文或明文
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub secret_type: SecretType,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub usage_count: u64,
    pub rotation_due: DateTime<Utc>,
    pub needs_rotation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotated_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotated_from: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 保险库文档：所有密钥记录加上库级元数据
///
/// 本地后端将整个文档序列化后作为单一信封加密落盘。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultDocument {
    pub secrets: HashMap<String, SecretRecord>,
    pub metadata: VaultMetadata,
}

impl Default for VaultDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultDocument {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            secrets: HashMap::new(),
            metadata: VaultMetadata {
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// 新增一条密钥记录，返回新密钥 ID
    pub fn store(
        &mut self,
        secret_type: SecretType,
        name: &str,
        encrypted_data: EncryptedData,
    ) -> String {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let record = SecretRecord {
            secret_type,
            name: name.to_string(),
            encrypted_data,
            metadata: SecretMetadata::new(secret_type, now),
        };
        self.secrets.insert(id.clone(), record);
        self.metadata.updated_at = now;
        id
    }

    pub fn record(&self, id: &str) -> Option<&SecretRecord> {
        self.secrets.get(id)
    }

    /// 记录一次访问（使用计数与最近使用时间），返回记录以供解密
    pub fn mark_used(&mut self, id: &str) -> Option<&SecretRecord> {
        let now = Utc::now();
        let record = self.secrets.get_mut(id)?;
        record.metadata.usage_count += 1;
        record.metadata.last_used = now;
        self.metadata.updated_at = now;
        Some(&self.secrets[id])
    }

    /// 原地更新密钥负载，并按类型重算下次轮换时间
    pub fn update(&mut self, id: &str, encrypted_data: EncryptedData) -> bool {
        let now = Utc::now();
        let Some(record) = self.secrets.get_mut(id) else {
            return false;
        };
        record.encrypted_data = encrypted_data;
        record.metadata.updated_at = now;
        record.metadata.rotation_due = now + rotation::rotation_interval(record.secret_type);
        self.metadata.updated_at = now;
        true
    }

    /// 轮换：创建后继记录并在新旧记录之间建立双向引用，返回新密钥 ID
    pub fn rotate(&mut self, id: &str, encrypted_data: EncryptedData) -> Option<String> {
        let now = Utc::now();
        let (secret_type, name, previous_due) = {
            let record = self.secrets.get(id)?;
            (
                record.secret_type,
                record.name.clone(),
                record.metadata.rotation_due,
            )
        };

        let new_id = Uuid::new_v4().to_string();
        let mut metadata = SecretMetadata::new(secret_type, now);
        metadata.rotated_from = Some(id.to_string());
        self.secrets.insert(
            new_id.clone(),
            SecretRecord {
                secret_type,
                name,
                encrypted_data,
                metadata,
            },
        );

        if let Some(old) = self.secrets.get_mut(id) {
            old.metadata.rotation_history.push(RotationEvent {
                rotated_at: now,
                previous_rotation_due: previous_due,
            });
            old.metadata.rotated_to = Some(new_id.clone());
            old.metadata.updated_at = now;
        }
        self.metadata.updated_at = now;

        Some(new_id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.secrets.remove(id).is_some();
        if removed {
            self.metadata.updated_at = Utc::now();
        }
        removed
    }

    /// 列出摘要（仅元数据），可按类型过滤；返回的均为独立副本
    pub fn summaries(&self, filter: Option<SecretType>) -> Vec<SecretSummary> {
        self.secrets
            .iter()
            .filter(|(_, record)| filter.is_none_or(|t| record.secret_type == t))
            .map(|(id, record)| Self::summarize(id, record))
            .collect()
    }

    fn summarize(id: &str, record: &SecretRecord) -> SecretSummary {
        SecretSummary {
            id: id.to_string(),
            secret_type: record.secret_type,
            name: record.name.clone(),
            created_at: record.metadata.created_at,
            updated_at: record.metadata.updated_at,
            last_used: record.metadata.last_used,
            usage_count: record.metadata.usage_count,
            rotation_due: record.metadata.rotation_due,
            needs_rotation: rotation::is_rotation_needed(&record.metadata),
            rotated_to: record.metadata.rotated_to.clone(),
            rotated_from: record.metadata.rotated_from.clone(),
        }
    }
}

/// 已知的逻辑服务及其旧版配置变量
pub struct KnownService {
    pub name: &'static str,
    pub secret_type: SecretType,
    pub legacy_var: &'static str,
}

pub const KNOWN_SERVICES: &[KnownService] = &[
    KnownService {
        name: "openai",
        secret_type: SecretType::ApiKey,
        legacy_var: "OPENAI_API_KEY",
    },
    KnownService {
        name: "google_maps",
        secret_type: SecretType::ApiKey,
        legacy_var: "GOOGLE_MAPS_API_KEY",
    },
    KnownService {
        name: "sendgrid",
        secret_type: SecretType::ApiKey,
        legacy_var: "SENDGRID_API_KEY",
    },
    KnownService {
        name: "weatherapi",
        secret_type: SecretType::ApiKey,
        legacy_var: "WEATHER_API_KEY",
    },
    KnownService {
        name: "amadeus",
        secret_type: SecretType::ApiKey,
        legacy_var: "AMADEUS_API_KEY",
    },
    KnownService {
        name: "auth_jwt",
        secret_type: SecretType::JwtSecret,
        legacy_var: "JWT_SECRET",
    },
    KnownService {
        name: "data_encryption",
        secret_type: SecretType::EncryptionKey,
        legacy_var: "DATA_ENCRYPTION_KEY",
    },
];

/// 按逻辑名称查找已知服务
pub fn known_service(name: &str) -> Option<&'static KnownService> {
    KNOWN_SERVICES.iter().find(|service| service.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_payload() -> EncryptedData {
        EncryptedData {
            encrypted: "00".to_string(),
            iv: "00".to_string(),
            auth_tag: "00".to_string(),
        }
    }

    #[test]
    fn store_sets_rotation_due_from_type() {
        let mut doc = VaultDocument::new();
        let id = doc.store(SecretType::ApiKey, "openai", dummy_payload());

        let record = doc.record(&id).unwrap();
        let expected = record.metadata.created_at + chrono::Duration::days(90);
        assert_eq!(record.metadata.rotation_due, expected);
        assert_eq!(record.metadata.usage_count, 0);
    }

    #[test]
    fn mark_used_increments_usage() {
        let mut doc = VaultDocument::new();
        let id = doc.store(SecretType::ApiKey, "openai", dummy_payload());

        doc.mark_used(&id).unwrap();
        doc.mark_used(&id).unwrap();

        assert_eq!(doc.record(&id).unwrap().metadata.usage_count, 2);
    }

    #[test]
    fn rotate_links_old_and_new_records() {
        let mut doc = VaultDocument::new();
        let id = doc.store(SecretType::ApiKey, "openai", dummy_payload());

        let new_id = doc.rotate(&id, dummy_payload()).unwrap();
        assert_ne!(id, new_id);

        let old = doc.record(&id).unwrap();
        assert_eq!(old.metadata.rotated_to.as_deref(), Some(new_id.as_str()));
        assert_eq!(old.metadata.rotation_history.len(), 1);

        let new = doc.record(&new_id).unwrap();
        assert_eq!(new.metadata.rotated_from.as_deref(), Some(id.as_str()));
        assert_eq!(new.name, "openai");
    }

    #[test]
    fn rotate_unknown_id_returns_none() {
        let mut doc = VaultDocument::new();
        assert!(doc.rotate("missing", dummy_payload()).is_none());
    }

    #[test]
    fn summaries_filter_by_type() {
        let mut doc = VaultDocument::new();
        doc.store(SecretType::ApiKey, "openai", dummy_payload());
        doc.store(SecretType::JwtSecret, "auth_jwt", dummy_payload());

        let all = doc.summaries(None);
        assert_eq!(all.len(), 2);

        let jwt_only = doc.summaries(Some(SecretType::JwtSecret));
        assert_eq!(jwt_only.len(), 1);
        assert_eq!(jwt_only[0].name, "auth_jwt");
    }

    #[test]
    fn summaries_never_contain_payload_fields() {
        let mut doc = VaultDocument::new();
        doc.store(SecretType::ApiKey, "openai", dummy_payload());

        let json = serde_json::to_value(doc.summaries(None)).unwrap();
        let entry = &json.as_array().unwrap()[0];
        assert!(entry.get("encrypted").is_none());
        assert!(entry.get("encryptedData").is_none());
        assert!(entry.get("value").is_none());
        assert!(entry.get("needsRotation").is_some());
    }

    #[test]
    fn secret_type_round_trips_snake_case() {
        let json = serde_json::to_string(&SecretType::JwtSecret).unwrap();
        assert_eq!(json, "\"jwt_secret\"");

        let parsed: SecretType = serde_json::from_str("\"ssh_key\"").unwrap();
        assert_eq!(parsed, SecretType::SshKey);
    }

    #[test]
    fn unknown_secret_type_is_rejected() {
        let result = serde_json::from_str::<SecretType>("\"pigeon_post\"");
        assert!(result.is_err());
    }

    #[test]
    fn known_service_lookup() {
        assert_eq!(
            known_service("auth_jwt").unwrap().secret_type,
            SecretType::JwtSecret
        );
        assert!(known_service("nope").is_none());
    }
}
