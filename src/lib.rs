//! Wayfare 密钥保险库核心：静态加密存储、轮换调度与令牌提供门面。
//!
//! 应用的其余部分（HTTP 路由、界面、CDN 管线）只通过 [`TokenProvider`]
//! 访问密钥；存储后端与加密细节对协作方不可见。

mod app;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use app::VaultState;
pub use application::dto::token_dto::{RotationDueDto, TokenStateDto};
pub use application::errors::ApplicationError;
pub use application::services::token_provider::TokenProvider;
pub use config::{KdfParams, StoreBackend, VaultConfig};
pub use domain::errors::DomainError;
pub use domain::models::secret::{SecretSummary, SecretType};
pub use domain::repositories::secret_store::SecretStore;
pub use infrastructure::logging::logger;
