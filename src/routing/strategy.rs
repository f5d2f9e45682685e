//! The strategy contract implemented by the page, API and component routers.

use async_trait::async_trait;
use axum::response::Response;

use crate::domain::tenant::TenantContext;

use super::{
    env::RoutingEnv,
    error::{RoutingError, UrlError},
    handler::{AuthorizationFailure, HandlerInvocation},
    link::UrlSpec,
    pipeline,
    registry::StrategyKind,
    request::RouteRequest,
};

/// Outcome of resolving a request, before any handler code runs.
pub enum Resolution {
    Invoke(HandlerInvocation),
    /// The strategy answered on its own: a redirect or an error body.
    Respond(Response),
}

#[async_trait]
pub trait RouterStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Whether this strategy claims the request. Must not have side effects.
    async fn supports(&self, request: &RouteRequest) -> bool;

    async fn resolve(&self, request: &RouteRequest) -> Result<Resolution, RoutingError>;

    async fn build_url(&self, request: &RouteRequest, spec: &UrlSpec) -> Result<String, UrlError>;

    async fn active_locale(&self, request: &RouteRequest) -> String;

    async fn handle_authorization_failure(
        &self,
        request: &RouteRequest,
        failure: &AuthorizationFailure,
    ) -> Response;

    /// Response for a request whose handler or operation does not exist.
    fn not_found(&self, request: &RouteRequest, detail: &str) -> Response;

    /// Whether handlers' `validate` step runs for this strategy.
    fn validates(&self) -> bool {
        true
    }

    async fn is_cacheable(&self, _request: &RouteRequest) -> bool {
        false
    }

    /// Resolve and, when a handler was found, run it through the pipeline.
    async fn route(&self, request: &RouteRequest) -> Result<Response, RoutingError> {
        match self.resolve(request).await? {
            Resolution::Respond(response) => Ok(response),
            Resolution::Invoke(invocation) => {
                request.remember_endpoint(invocation.endpoint());
                Ok(pipeline::run(self, request, invocation).await)
            }
        }
    }
}

/// Locale from the session when the tenant supports it, else the tenant's primary.
pub(crate) fn session_or_primary_locale(
    env: &RoutingEnv,
    request: &RouteRequest,
    context: &TenantContext,
) -> String {
    let site = env.site_locales();
    request
        .session_locale()
        .filter(|locale| context.supports_locale(site, locale))
        .unwrap_or_else(|| context.primary_locale(site))
        .to_string()
}
