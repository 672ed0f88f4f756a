use async_trait::async_trait;

use crate::domain::errors::DomainError;
use crate::domain::models::secret::{SecretSummary, SecretType};

/// 密钥存储契约，所有后端实现同一接口
///
/// 后端在构造期选定一次，调用方只持有 `Arc<dyn SecretStore>`。
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// 加密并写入新密钥，返回新密钥 ID
    async fn store_secret(
        &self,
        secret_type: SecretType,
        name: &str,
        value: &str,
    ) -> Result<String, DomainError>;

    /// 读取并解密密钥明文；同时累加使用计数并持久化
    async fn get_secret(&self, id: &str) -> Result<String, DomainError>;

    /// 原地重新加密，并按类型重算下次轮换时间
    async fn update_secret(&self, id: &str, new_value: &str) -> Result<(), DomainError>;

    /// 轮换：创建后继记录并保留旧记录，返回新密钥 ID
    async fn rotate_secret(&self, id: &str, new_value: &str) -> Result<String, DomainError>;

    /// 删除指定密钥
    async fn delete_secret(&self, id: &str) -> Result<(), DomainError>;

    /// 列出摘要（仅元数据），可按类型过滤
    async fn list_secrets(
        &self,
        filter: Option<SecretType>,
    ) -> Result<Vec<SecretSummary>, DomainError>;

    /// 获取已到轮换期的密钥摘要
    async fn secrets_needing_rotation(&self) -> Result<Vec<SecretSummary>, DomainError>;
}
