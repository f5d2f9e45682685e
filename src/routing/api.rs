//! REST strategy: `/<context>/api/<version>/<entity>/...` and
//! `/<context>/plugins/<category>/<name>/api/<version>/<entity>/...`.
//!
//! The entity module is looked up in the registry; its declared routes are then
//! matched against a normalized path with `matchit`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    http::{Method, StatusCode},
    response::Response,
};
use tracing::warn;

use crate::domain::{
    tenant::TenantContext,
    url::{SITE_CONTEXT, canonical_context, sanitize_segment},
};

use super::{
    env::RoutingEnv,
    error::{RoutingError, UrlError, json_error},
    handler::{ApiRoute, Args, AuthorizationFailure, HandlerInvocation},
    link::{ContextOverride, LinkParts, UrlSpec, compose},
    parser::ENDPOINT_PARAM,
    registry::{StrategyKind, api_handler_id},
    request::RouteRequest,
    strategy::{Resolution, RouterStrategy, session_or_primary_locale},
};

pub const API_MARKER: &str = "api";
pub const PLUGIN_MARKER: &str = "plugins";

pub const ENDPOINT_NOT_FOUND: &str = "api.404.endpointNotFound";
pub const CONTEXT_NOT_FOUND: &str = "api.404.contextNotFound";
pub const METHOD_NOT_ALLOWED: &str = "api.405.methodNotAllowed";

const TENANT_PARAM: &str = "tenant";
const VERSION_PARAM: &str = "version";
const STRATEGY: &str = "api";

/// The API-relevant reading of a request's segments.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ApiShape {
    plugin: Option<(String, String)>,
    version: String,
    entity: Option<String>,
    tail: Vec<String>,
}

impl ApiShape {
    fn parse(rest: &[String]) -> Option<Self> {
        let (plugin, from) = match rest.first().map(String::as_str) {
            Some(API_MARKER) => (None, 1),
            Some(PLUGIN_MARKER) if rest.get(3).map(String::as_str) == Some(API_MARKER) => (
                Some((sanitize_segment(&rest[1]), sanitize_segment(&rest[2]))),
                4,
            ),
            _ => return None,
        };
        let version = sanitize_segment(rest.get(from)?);
        let entity = rest
            .get(from + 1)
            .map(|entity| sanitize_segment(entity))
            .filter(|entity| !entity.is_empty());
        let tail = rest
            .iter()
            .skip(from + 2)
            .filter(|segment| !segment.is_empty())
            .cloned()
            .collect();
        Some(Self {
            plugin,
            version,
            entity,
            tail,
        })
    }

    fn handler_id(&self, entity: &str) -> String {
        let plugin = self
            .plugin
            .as_ref()
            .map(|(category, name)| (category.as_str(), name.as_str()));
        api_handler_id(plugin, &self.version, entity)
    }
}

pub struct ApiRouter {
    env: Arc<RoutingEnv>,
}

impl ApiRouter {
    pub fn new(env: Arc<RoutingEnv>) -> Self {
        Self { env }
    }

    async fn error(&self, request: &RouteRequest, status: StatusCode, key: &str) -> Response {
        let locale = self.active_locale(request).await;
        json_error(status, key, self.env.translate(&locale, key, &[]))
    }

    /// Match `synthetic` against the entity's declared routes.
    fn match_route(
        entity: &str,
        routes: Vec<ApiRoute>,
        synthetic: &str,
        method: &Method,
    ) -> RouteMatch {
        let mut groups: Vec<(String, Vec<ApiRoute>)> = Vec::new();
        for route in routes {
            match groups.iter_mut().find(|(pattern, _)| *pattern == route.pattern) {
                Some((_, group)) => group.push(route),
                None => groups.push((route.pattern.clone(), vec![route])),
            }
        }

        let mut table = matchit::Router::new();
        for (index, (pattern, _)) in groups.iter().enumerate() {
            let full =
                format!("/{{{TENANT_PARAM}}}/{API_MARKER}/{{{VERSION_PARAM}}}/{entity}{pattern}");
            if let Err(err) = table.insert(full, index) {
                warn!(
                    target = "folio::routing::api",
                    entity,
                    pattern = %pattern,
                    error = %err,
                    result = "route_conflict",
                    "Skipping API route that cannot be registered"
                );
            }
        }

        let Ok(matched) = table.at(synthetic) else {
            return RouteMatch::NoRoute;
        };
        let params: Vec<(String, String)> = matched
            .params
            .iter()
            .filter(|(name, _)| *name != TENANT_PARAM && *name != VERSION_PARAM)
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        let Some((_, group)) = groups.get(*matched.value) else {
            return RouteMatch::NoRoute;
        };

        let found = group
            .iter()
            .find(|route| route.method == *method)
            .or_else(|| {
                (*method == Method::HEAD)
                    .then(|| group.iter().find(|route| route.method == Method::GET))
                    .flatten()
            });
        match found {
            Some(route) => RouteMatch::Found {
                route: route.clone(),
                params,
            },
            None => RouteMatch::MethodNotAllowed,
        }
    }
}

enum RouteMatch {
    Found {
        route: ApiRoute,
        params: Vec<(String, String)>,
    },
    MethodNotAllowed,
    NoRoute,
}

#[async_trait]
impl RouterStrategy for ApiRouter {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Api
    }

    async fn supports(&self, request: &RouteRequest) -> bool {
        ApiShape::parse(request.parsed().rest_segments()).is_some()
    }

    async fn resolve(&self, request: &RouteRequest) -> Result<Resolution, RoutingError> {
        let parsed = request.parsed();
        let Some(shape) = ApiShape::parse(parsed.rest_segments()) else {
            return Ok(Resolution::Respond(
                self.error(request, StatusCode::NOT_FOUND, ENDPOINT_NOT_FOUND)
                    .await,
            ));
        };

        let context = self.env.tenants.current(request).await?;
        if parsed.context() != SITE_CONTEXT && context.is_site() {
            return Ok(Resolution::Respond(
                self.error(request, StatusCode::NOT_FOUND, CONTEXT_NOT_FOUND)
                    .await,
            ));
        }

        let Some(entity) = shape.entity.as_deref() else {
            return Ok(Resolution::Respond(
                self.error(request, StatusCode::NOT_FOUND, ENDPOINT_NOT_FOUND)
                    .await,
            ));
        };
        let handler_id = shape.handler_id(entity);
        let Some(handler) = self
            .env
            .registry
            .resolve(StrategyKind::Api, &handler_id, request)
        else {
            return Ok(Resolution::Respond(
                self.error(request, StatusCode::NOT_FOUND, ENDPOINT_NOT_FOUND)
                    .await,
            ));
        };

        let tail: String = shape.tail.iter().map(|segment| format!("/{segment}")).collect();
        let synthetic = format!(
            "/{}/{API_MARKER}/{}/{entity}{tail}",
            parsed.context(),
            shape.version
        );

        match Self::match_route(entity, handler.api_routes(), &synthetic, request.method()) {
            RouteMatch::Found { route, params } => Ok(Resolution::Invoke(HandlerInvocation {
                handler,
                handler_id,
                op: route.op,
                args: Args::named(params),
                roles: route.roles,
            })),
            RouteMatch::MethodNotAllowed => Ok(Resolution::Respond(
                self.error(request, StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED)
                    .await,
            )),
            RouteMatch::NoRoute => Ok(Resolution::Respond(
                self.error(request, StatusCode::NOT_FOUND, ENDPOINT_NOT_FOUND)
                    .await,
            )),
        }
    }

    async fn active_locale(&self, request: &RouteRequest) -> String {
        if let Some(locale) = request.locale() {
            return locale.to_string();
        }
        let context = self
            .env
            .tenants
            .current(request)
            .await
            .unwrap_or(TenantContext::Site);
        let locale = session_or_primary_locale(&self.env, request, &context);
        request.remember_locale(locale).to_string()
    }

    async fn handle_authorization_failure(
        &self,
        request: &RouteRequest,
        failure: &AuthorizationFailure,
    ) -> Response {
        let locale = self.active_locale(request).await;
        let message = self
            .env
            .translate(&locale, &failure.message_key, &failure.params);
        json_error(StatusCode::FORBIDDEN, &failure.message_key, message)
    }

    fn not_found(&self, request: &RouteRequest, _detail: &str) -> Response {
        let locale = request
            .locale()
            .unwrap_or(self.env.site_locales().primary.as_str())
            .to_string();
        json_error(
            StatusCode::NOT_FOUND,
            ENDPOINT_NOT_FOUND,
            self.env.translate(&locale, ENDPOINT_NOT_FOUND, &[]),
        )
    }

    /// API URLs take a context and an endpoint relative to the API version, e.g.
    /// `submissions/12`. Without an endpoint the current API path is reused.
    async fn build_url(&self, request: &RouteRequest, spec: &UrlSpec) -> Result<String, UrlError> {
        for (field, present) in [
            ("op", spec.op.is_some()),
            ("path", spec.path.is_some()),
            ("anchor", spec.anchor.is_some()),
        ] {
            if present {
                return Err(UrlError::UnsupportedOverride {
                    strategy: STRATEGY,
                    field,
                });
            }
        }

        let context = match &spec.context {
            None => request.parsed().context().to_string(),
            Some(ContextOverride::Path(path)) => canonical_context(Some(path)),
            Some(ContextOverride::Levels(levels)) => {
                return Err(UrlError::ContextLevels {
                    strategy: STRATEGY,
                    levels: levels.len(),
                });
            }
        };

        let segments: Vec<String> = match &spec.endpoint {
            Some(endpoint) => [API_MARKER.to_string(), self.env.settings.api_version.clone()]
                .into_iter()
                .chain(
                    endpoint
                        .trim_matches('/')
                        .split('/')
                        .filter(|part| !part.is_empty())
                        .map(str::to_string),
                )
                .collect(),
            None => {
                let rest = request.parsed().rest_segments();
                if ApiShape::parse(rest).is_none() {
                    return Err(UrlError::MissingEndpoint { strategy: STRATEGY });
                }
                rest.iter().filter(|part| !part.is_empty()).cloned().collect()
            }
        };

        let routing_params = vec![(ENDPOINT_PARAM.to_string(), format!("/{}", segments.join("/")))];
        compose(
            &self.env.settings,
            request,
            LinkParts {
                context,
                segments,
                routing_params,
                params: spec.params.clone(),
                anchor: None,
                escape: spec.escape,
            },
        )
    }
}
