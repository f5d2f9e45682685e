//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::tenant::Tenant;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Lookup of tenants by their URL path, owned by the persistence layer.
#[async_trait]
pub trait TenantRepo: Send + Sync {
    async fn find_by_path(&self, path: &str) -> Result<Option<Tenant>, RepoError>;
}
