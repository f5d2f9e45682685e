//! Shared, read-only state handed to every strategy.

use std::sync::Arc;

use crate::{
    application::{messages::MessageCatalog, repos::TenantRepo},
    config::{RoutingSettings, SiteSettings},
    domain::tenant::SiteLocales,
};

use super::{registry::HandlerRegistry, tenant::TenantResolver};

pub struct RoutingEnv {
    pub settings: RoutingSettings,
    pub site: SiteSettings,
    pub registry: HandlerRegistry,
    pub tenants: TenantResolver,
    pub messages: Arc<dyn MessageCatalog>,
}

impl RoutingEnv {
    pub fn new(
        settings: RoutingSettings,
        site: SiteSettings,
        registry: HandlerRegistry,
        tenants: Arc<dyn TenantRepo>,
        messages: Arc<dyn MessageCatalog>,
    ) -> Self {
        Self {
            settings,
            site,
            registry,
            tenants: TenantResolver::new(tenants),
            messages,
        }
    }

    pub fn site_locales(&self) -> &SiteLocales {
        &self.site.locales
    }

    pub fn translate(&self, locale: &str, key: &str, params: &[(String, String)]) -> String {
        self.messages.translate(locale, key, params)
    }
}
