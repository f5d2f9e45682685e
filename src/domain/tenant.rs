//! Tenant (publication venue) records and the resolved request context.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use super::url::SITE_CONTEXT;

/// A tenant as stored by the external persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tenant {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub path: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub primary_locale: String,
    #[serde(default)]
    pub supported_locales: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl Tenant {
    pub fn supports_locale(&self, locale: &str) -> bool {
        self.primary_locale == locale || self.supported_locales.iter().any(|l| l == locale)
    }

    pub fn is_multilingual(&self) -> bool {
        self.supported_locales.len() > 1
    }
}

/// Site-level locale configuration, used when no tenant is in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLocales {
    pub primary: String,
    pub supported: Vec<String>,
}

impl SiteLocales {
    pub fn supports(&self, locale: &str) -> bool {
        self.primary == locale || self.supported.iter().any(|l| l == locale)
    }
}

/// The tenant a request runs under, or the site itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantContext {
    Site,
    Tenant(Arc<Tenant>),
}

impl TenantContext {
    pub fn path(&self) -> &str {
        match self {
            TenantContext::Site => SITE_CONTEXT,
            TenantContext::Tenant(tenant) => &tenant.path,
        }
    }

    pub fn tenant(&self) -> Option<&Tenant> {
        match self {
            TenantContext::Site => None,
            TenantContext::Tenant(tenant) => Some(tenant),
        }
    }

    pub fn is_site(&self) -> bool {
        matches!(self, TenantContext::Site)
    }

    /// Whether the context is administratively disabled. The site never is.
    pub fn is_disabled(&self) -> bool {
        self.tenant().is_some_and(|tenant| !tenant.enabled)
    }

    pub fn primary_locale<'a>(&'a self, site: &'a SiteLocales) -> &'a str {
        match self {
            TenantContext::Site => &site.primary,
            TenantContext::Tenant(tenant) => &tenant.primary_locale,
        }
    }

    pub fn supports_locale(&self, site: &SiteLocales, locale: &str) -> bool {
        match self {
            TenantContext::Site => site.supports(locale),
            TenantContext::Tenant(tenant) => tenant.supports_locale(locale),
        }
    }

    pub fn is_multilingual(&self, site: &SiteLocales) -> bool {
        match self {
            TenantContext::Site => site.supported.len() > 1,
            TenantContext::Tenant(tenant) => tenant.is_multilingual(),
        }
    }
}
