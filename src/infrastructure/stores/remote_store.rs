use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::domain::errors::DomainError;
use crate::domain::models::secret::{SecretSummary, SecretType};
use crate::domain::repositories::secret_store::SecretStore;

/// 远程后端存根：同一契约走 JSON HTTP API
///
/// 每次调用都套用调用方给定的截止时间；线协议本身不属于本核心。
pub struct RemoteSecretStore {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct StoreSecretRequest<'a> {
    #[serde(rename = "type")]
    secret_type: SecretType,
    name: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct SecretValueRequest<'a> {
    value: &'a str,
}

#[derive(Deserialize)]
struct SecretIdResponse {
    id: String,
}

#[derive(Deserialize)]
struct SecretValueResponse {
    value: String,
}

impl RemoteSecretStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DomainError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Apply the configured deadline; expiry surfaces as `Timeout`, never as
    /// `NotFound` or `Decryption`.
    async fn with_deadline<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::Timeout(format!(
                "{} exceeded {:?}",
                operation, self.timeout
            ))),
        }
    }

    fn check_status(status: StatusCode, subject: &str) -> Result<(), DomainError> {
        if status == StatusCode::NOT_FOUND {
            return Err(DomainError::NotFound(subject.to_string()));
        }
        if !status.is_success() {
            return Err(DomainError::Internal(format!(
                "Remote store returned {} for {}",
                status, subject
            )));
        }
        Ok(())
    }

    fn transport_error(e: reqwest::Error) -> DomainError {
        DomainError::Internal(format!("Remote store request failed: {e}"))
    }
}

#[async_trait]
impl SecretStore for RemoteSecretStore {
    async fn store_secret(
        &self,
        secret_type: SecretType,
        name: &str,
        value: &str,
    ) -> Result<String, DomainError> {
        let url = self.url("/secrets");
        self.with_deadline("store_secret", async {
            let response = self
                .client
                .post(&url)
                .json(&StoreSecretRequest {
                    secret_type,
                    name,
                    value,
                })
                .send()
                .await
                .map_err(Self::transport_error)?;
            Self::check_status(response.status(), name)?;
            let body: SecretIdResponse = response.json().await.map_err(Self::transport_error)?;
            Ok(body.id)
        })
        .await
    }

    async fn get_secret(&self, id: &str) -> Result<String, DomainError> {
        let url = self.url(&format!("/secrets/{id}"));
        self.with_deadline("get_secret", async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(Self::transport_error)?;
            Self::check_status(response.status(), id)?;
            let body: SecretValueResponse = response.json().await.map_err(Self::transport_error)?;
            Ok(body.value)
        })
        .await
    }

    async fn update_secret(&self, id: &str, new_value: &str) -> Result<(), DomainError> {
        let url = self.url(&format!("/secrets/{id}"));
        self.with_deadline("update_secret", async {
            let response = self
                .client
                .put(&url)
                .json(&SecretValueRequest { value: new_value })
                .send()
                .await
                .map_err(Self::transport_error)?;
            Self::check_status(response.status(), id)
        })
        .await
    }

    async fn rotate_secret(&self, id: &str, new_value: &str) -> Result<String, DomainError> {
        let url = self.url(&format!("/secrets/{id}/rotate"));
        self.with_deadline("rotate_secret", async {
            let response = self
                .client
                .post(&url)
                .json(&SecretValueRequest { value: new_value })
                .send()
                .await
                .map_err(Self::transport_error)?;
            Self::check_status(response.status(), id)?;
            let body: SecretIdResponse = response.json().await.map_err(Self::transport_error)?;
            Ok(body.id)
        })
        .await
    }

    async fn delete_secret(&self, id: &str) -> Result<(), DomainError> {
        let url = self.url(&format!("/secrets/{id}"));
        self.with_deadline("delete_secret", async {
            let response = self
                .client
                .delete(&url)
                .send()
                .await
                .map_err(Self::transport_error)?;
            Self::check_status(response.status(), id)
        })
        .await
    }

    async fn list_secrets(
        &self,
        filter: Option<SecretType>,
    ) -> Result<Vec<SecretSummary>, DomainError> {
        let url = match filter {
            Some(secret_type) => self.url(&format!("/secrets?type={secret_type}")),
            None => self.url("/secrets"),
        };
        self.with_deadline("list_secrets", async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(Self::transport_error)?;
            Self::check_status(response.status(), "secrets")?;
            response.json().await.map_err(Self::transport_error)
        })
        .await
    }

    async fn secrets_needing_rotation(&self) -> Result<Vec<SecretSummary>, DomainError> {
        let url = self.url("/secrets/rotation-due");
        self.with_deadline("secrets_needing_rotation", async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(Self::transport_error)?;
            Self::check_status(response.status(), "rotation-due")?;
            response.json().await.map_err(Self::transport_error)
        })
        .await
    }
}
