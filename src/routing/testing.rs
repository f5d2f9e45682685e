//! Fixtures shared by the routing unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::{
        messages::StaticCatalog,
        repos::{RepoError, TenantRepo},
    },
    config::{RoutingSettings, SiteSettings},
    domain::{identity::Session, tenant::Tenant},
};

use super::{
    env::RoutingEnv,
    parser::{ParseOptions, PathInfoParser, UrlParser, path_info},
    registry::HandlerRegistry,
    request::{IncomingRequest, RouteRequest},
};

/// `demo`: bilingual (`en`, `fr_CA`).
pub(crate) fn demo_tenant(enabled: bool) -> Tenant {
    Tenant {
        id: Uuid::nil(),
        path: "demo".to_string(),
        name: "Demo Review".to_string(),
        enabled,
        primary_locale: "en".to_string(),
        supported_locales: vec!["en".to_string(), "fr_CA".to_string()],
    }
}

fn tenant(path: &str, enabled: bool) -> Tenant {
    Tenant {
        id: Uuid::nil(),
        path: path.to_string(),
        name: path.to_string(),
        enabled,
        primary_locale: "en".to_string(),
        supported_locales: vec!["en".to_string()],
    }
}

pub(crate) struct StaticTenants(pub Vec<Tenant>);

#[async_trait]
impl TenantRepo for StaticTenants {
    async fn find_by_path(&self, path: &str) -> Result<Option<Tenant>, RepoError> {
        Ok(self.0.iter().find(|tenant| tenant.path == path).cloned())
    }
}

/// Tenants `demo` (bilingual), `mono` (English only) and `closed` (disabled).
pub(crate) fn env_with(settings: RoutingSettings, registry: HandlerRegistry) -> Arc<RoutingEnv> {
    Arc::new(RoutingEnv::new(
        settings,
        SiteSettings::default(),
        registry,
        Arc::new(StaticTenants(vec![
            demo_tenant(true),
            tenant("mono", true),
            tenant("closed", false),
        ])),
        Arc::new(StaticCatalog::with_router_messages()),
    ))
}

/// Parse `incoming` in path-info mode against `http://localhost`.
pub(crate) fn route_request(incoming: IncomingRequest) -> RouteRequest {
    let options = ParseOptions {
        context_depth: 1,
        script_name: "index.php".to_string(),
        known_locales: vec!["en".to_string(), "fr_CA".to_string()],
        implied_context: None,
    };
    let parsed = PathInfoParser.parse(&incoming.path, &incoming.query_pairs(), &options);
    let info = path_info(&incoming.path, &options.script_name);
    RouteRequest::new(incoming, info, "http://localhost".to_string(), parsed)
}

pub(crate) fn anonymous_session() -> Session {
    Session::default()
}
