//! RPC strategy for UI components:
//! `/<context>/$$$call$$$/<package...>/<handler-name>/<op-name>`.
//!
//! `grid/users/user-grid/fetch-grid` resolves to operation `fetchGrid` on the
//! component registered as `grid.users.UserGridHandler`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{http::StatusCode, response::Response};

use crate::{
    domain::{tenant::TenantContext, url::canonical_context},
    util::naming::{camelize_head_down, camelize_head_up, uncamelize},
};

use super::{
    env::RoutingEnv,
    error::{RoutingError, UrlError, json_error},
    handler::{Args, AuthorizationFailure, Handler, HandlerInvocation},
    link::{ContextOverride, LinkParts, UrlSpec, compose},
    parser::{COMPONENT_PARAM, OP_PARAM},
    registry::StrategyKind,
    request::RouteRequest,
    strategy::{Resolution, RouterStrategy, session_or_primary_locale},
};

pub const COMPONENT_MARKER: &str = "$$$call$$$";
pub const COMPONENT_NOT_FOUND: &str = "component.404.notFound";

const MIN_DEPTH: usize = 3;
const MIN_SEGMENT_LEN: usize = 2;
const MAX_SEGMENT_LEN: usize = 50;
const HANDLER_SUFFIX: &str = "Handler";
const STRATEGY: &str = "component";

/// A component request decoded from its URL segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentEndpoint {
    /// Dotted registry identifier, e.g. `grid.users.UserGridHandler`.
    pub component_id: String,
    /// Camel-cased operation, e.g. `fetchGrid`.
    pub op: String,
}

impl ComponentEndpoint {
    /// Decode the segments after the marker; `None` when they violate the shape rules.
    pub fn from_segments(parts: &[String], max_depth: usize) -> Option<Self> {
        let parts: Vec<String> = parts.iter().map(|part| part.to_ascii_lowercase()).collect();
        if !valid_shape(&parts, max_depth) {
            return None;
        }
        let (op, rest) = parts.split_last()?;
        let (handler, package) = rest.split_last()?;
        let mut component_id = package.join(".");
        component_id.push('.');
        component_id.push_str(&camelize_head_up(handler));
        component_id.push_str(HANDLER_SUFFIX);
        Some(Self {
            component_id,
            op: camelize_head_down(op),
        })
    }
}

/// Depth within bounds and every segment of `[a-z0-9-]` with a bounded length.
fn valid_shape(parts: &[String], max_depth: usize) -> bool {
    (MIN_DEPTH..=max_depth).contains(&parts.len())
        && parts.iter().all(|part| {
            (MIN_SEGMENT_LEN..=MAX_SEGMENT_LEN).contains(&part.len())
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        })
}

pub struct ComponentRouter {
    env: Arc<RoutingEnv>,
}

impl ComponentRouter {
    pub fn new(env: Arc<RoutingEnv>) -> Self {
        Self { env }
    }

    fn endpoint(&self, request: &RouteRequest) -> Option<ComponentEndpoint> {
        let rest = request.parsed().rest_segments();
        match rest.split_first() {
            Some((marker, parts)) if marker == COMPONENT_MARKER => {
                ComponentEndpoint::from_segments(parts, self.env.settings.component_max_depth)
            }
            _ => None,
        }
    }

    fn handler_for(
        &self,
        request: &RouteRequest,
        endpoint: &ComponentEndpoint,
    ) -> Option<Arc<dyn Handler>> {
        self.env
            .registry
            .resolve(StrategyKind::Component, &endpoint.component_id, request)
            .filter(|handler| handler.has_operation(&endpoint.op))
    }

    async fn error(
        &self,
        request: &RouteRequest,
        status: StatusCode,
        key: &str,
        params: &[(String, String)],
    ) -> Response {
        let locale = self.active_locale(request).await;
        json_error(status, key, self.env.translate(&locale, key, params))
    }
}

#[async_trait]
impl RouterStrategy for ComponentRouter {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Component
    }

    /// Claims the request only when the marker, shape rules, handler and operation all
    /// check out; anything else falls through to later strategies.
    async fn supports(&self, request: &RouteRequest) -> bool {
        self.endpoint(request)
            .is_some_and(|endpoint| self.handler_for(request, &endpoint).is_some())
    }

    async fn resolve(&self, request: &RouteRequest) -> Result<Resolution, RoutingError> {
        let resolved = self.endpoint(request).and_then(|endpoint| {
            self.handler_for(request, &endpoint)
                .map(|handler| (endpoint, handler))
        });
        let Some((endpoint, handler)) = resolved else {
            return Ok(Resolution::Respond(
                self.error(request, StatusCode::NOT_FOUND, COMPONENT_NOT_FOUND, &[])
                    .await,
            ));
        };

        let roles = handler.role_assignments().for_op(&endpoint.op).to_vec();
        Ok(Resolution::Invoke(HandlerInvocation {
            handler,
            handler_id: endpoint.component_id,
            op: endpoint.op,
            args: Args::named(request.parsed().query().to_vec()),
            roles,
        }))
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
        self.error(
            request,
            StatusCode::FORBIDDEN,
            &failure.message_key,
            &failure.params,
        )
        .await
    }

    fn not_found(&self, request: &RouteRequest, _detail: &str) -> Response {
        let locale = request
            .locale()
            .unwrap_or(self.env.site_locales().primary.as_str())
            .to_string();
        json_error(
            StatusCode::NOT_FOUND,
            COMPONENT_NOT_FOUND,
            self.env.translate(&locale, COMPONENT_NOT_FOUND, &[]),
        )
    }

    /// The endpoint is a dotted component identifier, either the registered form
    /// (`grid.users.UserGridHandler`) or the URL form (`grid.users.user-grid`).
    async fn build_url(&self, request: &RouteRequest, spec: &UrlSpec) -> Result<String, UrlError> {
        if spec.path.is_some() {
            return Err(UrlError::UnsupportedOverride {
                strategy: STRATEGY,
                field: "path",
            });
        }

        let context = match &spec.context {
            None => request.parsed().context().to_string(),
            Some(ContextOverride::Path(path)) => canonical_context(Some(path)),
            Some(ContextOverride::Levels(levels)) if levels.len() == 1 => {
                canonical_context(levels.first().map(String::as_str))
            }
            Some(ContextOverride::Levels(levels)) => {
                return Err(UrlError::ContextLevels {
                    strategy: STRATEGY,
                    levels: levels.len(),
                });
            }
        };

        let current = self.endpoint(request);
        let component_id = match (&spec.endpoint, &current) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, Some(current)) => current.component_id.clone(),
            (None, None) => return Err(UrlError::MissingEndpoint { strategy: STRATEGY }),
        };
        let op = match (&spec.op, &current) {
            (Some(op), _) => op.clone(),
            (None, Some(current)) if spec.endpoint.is_none() => current.op.clone(),
            _ => return Err(UrlError::InvalidComponent(component_id)),
        };

        let mut parts: Vec<String> = component_id.split('.').map(str::to_string).collect();
        if let Some(handler) = parts.last_mut() {
            if let Some(name) = handler.strip_suffix(HANDLER_SUFFIX) {
                *handler = uncamelize(name);
            }
        }
        parts.push(uncamelize(&op));
        if !valid_shape(&parts, self.env.settings.component_max_depth) {
            return Err(UrlError::InvalidComponent(component_id));
        }

        let op_segment = parts.pop().unwrap_or_default();
        let routing_params = vec![
            (COMPONENT_PARAM.to_string(), parts.join(".")),
            (OP_PARAM.to_string(), op_segment.clone()),
        ];
        let mut segments = vec![COMPONENT_MARKER.to_string()];
        segments.extend(parts);
        segments.push(op_segment);

        compose(
            &self.env.settings,
            request,
            LinkParts {
                context,
                segments,
                routing_params,
                params: spec.params.clone(),
                anchor: spec.anchor.clone(),
                escape: spec.escape,
            },
        )
    }
}
