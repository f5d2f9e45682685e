//! Tenant repository backed by the `[[tenants]]` configuration section.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, TenantRepo},
    domain::tenant::Tenant,
};

/// Read-only tenant table loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct ConfigTenantRepo {
    by_path: HashMap<String, Tenant>,
}

impl ConfigTenantRepo {
    pub fn new(tenants: Vec<Tenant>) -> Self {
        Self {
            by_path: tenants
                .into_iter()
                .map(|tenant| (tenant.path.clone(), tenant))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

#[async_trait]
impl TenantRepo for ConfigTenantRepo {
    async fn find_by_path(&self, path: &str) -> Result<Option<Tenant>, RepoError> {
        Ok(self.by_path.get(path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn finds_tenants_by_path() {
        let repo = ConfigTenantRepo::new(vec![Tenant {
            id: Uuid::nil(),
            path: "demo".to_string(),
            name: "Demo".to_string(),
            enabled: true,
            primary_locale: "en".to_string(),
            supported_locales: Vec::new(),
        }]);
        assert_eq!(repo.len(), 1);
        let found = repo.find_by_path("demo").await.expect("lookup");
        assert_eq!(found.map(|tenant| tenant.name), Some("Demo".to_string()));
        assert!(repo.find_by_path("other").await.expect("lookup").is_none());
    }
}
