//! 轮换策略：按密钥类型给出静态轮换间隔。
//!
//! 该表是纯函数，存储层写入 `rotationDue` 与报表查询必须复用同一张表。

use chrono::{DateTime, Duration, Utc};

use crate::domain::models::secret::{SecretMetadata, SecretType};

/// 按类型返回轮换间隔
pub fn rotation_interval(secret_type: SecretType) -> Duration {
    let days = match secret_type {
        SecretType::ApiKey => 90,
        SecretType::JwtSecret => 180,
        SecretType::EncryptionKey => 365,
        SecretType::Database => 180,
        SecretType::Oauth => 30,
        SecretType::SshKey => 180,
        SecretType::Token => 30,
    };
    Duration::days(days)
}

/// 以当前时间计算下次轮换时间
pub fn next_rotation_date(secret_type: SecretType) -> DateTime<Utc> {
    Utc::now() + rotation_interval(secret_type)
}

/// 判断记录是否已到轮换期
pub fn is_rotation_needed(metadata: &SecretMetadata) -> bool {
    metadata.rotation_due <= Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::secret::{EncryptedData, SecretType, VaultDocument};

    #[test]
    fn intervals_match_policy_table() {
        assert_eq!(rotation_interval(SecretType::ApiKey), Duration::days(90));
        assert_eq!(rotation_interval(SecretType::JwtSecret), Duration::days(180));
        assert_eq!(
            rotation_interval(SecretType::EncryptionKey),
            Duration::days(365)
        );
        assert_eq!(rotation_interval(SecretType::Database), Duration::days(180));
        assert_eq!(rotation_interval(SecretType::Oauth), Duration::days(30));
        assert_eq!(rotation_interval(SecretType::SshKey), Duration::days(180));
        assert_eq!(rotation_interval(SecretType::Token), Duration::days(30));
    }

    #[test]
    fn next_rotation_date_is_in_the_future() {
        let due = next_rotation_date(SecretType::Oauth);
        assert!(due > Utc::now());
    }

    #[test]
    fn fresh_secret_does_not_need_rotation() {
        let mut doc = VaultDocument::new();
        let id = doc.store(
            SecretType::ApiKey,
            "openai",
            EncryptedData {
                encrypted: "00".to_string(),
                iv: "00".to_string(),
                auth_tag: "00".to_string(),
            },
        );
        assert!(!is_rotation_needed(&doc.record(&id).unwrap().metadata));
    }

    #[test]
    fn overdue_secret_needs_rotation() {
        let mut doc = VaultDocument::new();
        let id = doc.store(
            SecretType::ApiKey,
            "openai",
            EncryptedData {
                encrypted: "00".to_string(),
                iv: "00".to_string(),
                auth_tag: "00".to_string(),
            },
        );
        // Simulate the clock passing the due date by backdating the record.
        let record = doc.secrets.get_mut(&id).unwrap();
        record.metadata.rotation_due = Utc::now() - Duration::seconds(1);

        assert!(is_rotation_needed(&doc.record(&id).unwrap().metadata));
    }
}
