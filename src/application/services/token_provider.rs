use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::dto::token_dto::{RotationDueDto, TokenStateDto};
use crate::application::errors::ApplicationError;
use crate::application::services::token_cache::TokenCache;
use crate::config::VaultConfig;
use crate::domain::models::secret::{known_service, SecretType, KNOWN_SERVICES};
use crate::domain::repositories::secret_store::SecretStore;

struct ServiceMappings {
    initialized: bool,
    by_service: HashMap<String, String>,
}

/// 令牌提供者门面：外部协作方访问密钥的唯一入口
///
/// 解析顺序：缓存 → 存储映射 → 旧版配置快照。
pub struct TokenProvider {
    store: Arc<dyn SecretStore>,
    cache: TokenCache,
    legacy_values: HashMap<String, String>,
    mappings: Mutex<ServiceMappings>,
}

impl TokenProvider {
    pub fn new(store: Arc<dyn SecretStore>, config: &VaultConfig) -> Self {
        Self {
            store,
            cache: TokenCache::new(config.cache_ttl),
            legacy_values: config.legacy_values.clone(),
            mappings: Mutex::new(ServiceMappings {
                initialized: false,
                by_service: HashMap::new(),
            }),
        }
    }

    /// 扫描存储，为已知服务建立 serviceName -> secretId 映射
    ///
    /// 幂等：每个进程生命周期内只扫描一次。
    pub async fn initialize(&self) -> Result<(), ApplicationError> {
        let mut mappings = self.mappings.lock().await;
        if mappings.initialized {
            return Ok(());
        }

        let summaries = self.store.list_secrets(None).await?;
        for service in KNOWN_SERVICES {
            // A rotated-away record keeps its name; map the active successor.
            let candidate = summaries
                .iter()
                .filter(|s| s.name == service.name && s.rotated_to.is_none())
                .max_by_key(|s| s.updated_at);
            if let Some(summary) = candidate {
                mappings
                    .by_service
                    .insert(service.name.to_string(), summary.id.clone());
            }
        }

        mappings.initialized = true;
        tracing::info!(
            "Token provider initialized with {} service mappings",
            mappings.by_service.len()
        );
        Ok(())
    }

    /// 获取服务令牌
    pub async fn get_token(&self, service_name: &str) -> Result<String, ApplicationError> {
        self.initialize().await?;

        if let Some(token) = self.cache.get(service_name).await {
            return Ok(token);
        }

        let mapped_id = {
            let mappings = self.mappings.lock().await;
            mappings.by_service.get(service_name).cloned()
        };

        if let Some(id) = mapped_id {
            let token = self.store.get_secret(&id).await?;
            self.cache.put(service_name, &token).await;
            return Ok(token);
        }

        if let Some(service) = known_service(service_name) {
            if let Some(value) = self.legacy_values.get(service.legacy_var) {
                tracing::debug!("Serving token for {} from legacy configuration", service_name);
                return Ok(value.clone());
            }
        }

        Err(ApplicationError::NotFound(format!(
            "No token available for service: {service_name}"
        )))
    }

    /// 写入（或更新）服务令牌，返回密钥 ID
    pub async fn store_token(
        &self,
        service_name: &str,
        value: &str,
    ) -> Result<String, ApplicationError> {
        self.initialize().await?;
        tracing::info!("Storing token for service: {}", service_name);

        let mut mappings = self.mappings.lock().await;
        let id = match mappings.by_service.get(service_name) {
            Some(id) => {
                self.store.update_secret(id, value).await?;
                id.clone()
            }
            None => {
                let secret_type = known_service(service_name)
                    .map(|service| service.secret_type)
                    .unwrap_or(SecretType::ApiKey);
                let id = self.store.store_secret(secret_type, service_name, value).await?;
                mappings.by_service.insert(service_name.to_string(), id.clone());
                id
            }
        };

        self.cache.put(service_name, value).await;
        Ok(id)
    }

    /// 轮换服务令牌；要求映射已存在，返回后继密钥 ID
    pub async fn rotate_token(
        &self,
        service_name: &str,
        new_value: &str,
    ) -> Result<String, ApplicationError> {
        self.initialize().await?;
        tracing::info!("Rotating token for service: {}", service_name);

        let mut mappings = self.mappings.lock().await;
        let Some(id) = mappings.by_service.get(service_name).cloned() else {
            return Err(ApplicationError::NotFound(format!(
                "No managed token for service: {service_name}"
            )));
        };

        let new_id = self.store.rotate_secret(&id, new_value).await?;
        mappings
            .by_service
            .insert(service_name.to_string(), new_id.clone());
        self.cache.put(service_name, new_value).await;
        Ok(new_id)
    }

    /// 列出已到轮换期的服务令牌；未纳入门面管理的密钥不在报表内
    pub async fn tokens_needing_rotation(&self) -> Result<Vec<RotationDueDto>, ApplicationError> {
        self.initialize().await?;

        let due = self.store.secrets_needing_rotation().await?;
        let mappings = self.mappings.lock().await;
        let by_id: HashMap<String, String> = mappings
            .by_service
            .iter()
            .map(|(service, id)| (id.clone(), service.clone()))
            .collect();

        Ok(due
            .into_iter()
            .filter_map(|summary| {
                by_id.get(&summary.id).map(|service| RotationDueDto {
                    service_name: service.clone(),
                    secret_id: summary.id.clone(),
                    last_used: summary.last_used,
                    rotation_due: summary.rotation_due,
                })
            })
            .collect())
    }

    /// 将旧版配置中尚未入库的令牌导入存储，返回导入数量
    pub async fn import_legacy_config(&self) -> Result<usize, ApplicationError> {
        self.initialize().await?;

        let mut mappings = self.mappings.lock().await;
        let mut imported = 0;
        for service in KNOWN_SERVICES {
            if mappings.by_service.contains_key(service.name) {
                continue;
            }
            let Some(value) = self.legacy_values.get(service.legacy_var) else {
                continue;
            };

            let id = self
                .store
                .store_secret(service.secret_type, service.name, value)
                .await?;
            mappings.by_service.insert(service.name.to_string(), id);
            imported += 1;
            tracing::info!("Imported legacy token for service: {}", service.name);
        }

        Ok(imported)
    }

    /// 报告各已知服务是否已配置令牌（仅布尔值）
    pub async fn token_state(&self) -> Result<TokenStateDto, ApplicationError> {
        self.initialize().await?;

        let mappings = self.mappings.lock().await;
        let states = KNOWN_SERVICES
            .iter()
            .map(|service| {
                let present = mappings.by_service.contains_key(service.name)
                    || self.legacy_values.contains_key(service.legacy_var);
                (service.name.to_string(), present)
            })
            .collect();

        Ok(TokenStateDto { states })
    }

    /// 供管理界面展示的掩码值：最多露出末尾 3 个字符
    pub fn mask_token_value(value: &str) -> String {
        const THRESHOLD: usize = 10;
        const EXPOSED_SUFFIX: usize = 3;
        let chars = value.chars().collect::<Vec<_>>();
        if chars.len() <= THRESHOLD {
            return "*".repeat(THRESHOLD);
        }

        let suffix = chars[chars.len() - EXPOSED_SUFFIX..]
            .iter()
            .collect::<String>();
        format!("{}{}", "*".repeat(THRESHOLD - EXPOSED_SUFFIX), suffix)
    }
}
