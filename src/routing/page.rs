//! Catch-all strategy for HTML pages: `/<context>/<locale>/<page>/<op>/<args...>`.
//!
//! Besides handler resolution this router owns the pre-routing gates: the
//! installation gate, disabled-tenant redirect and locale negotiation.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    http::Method,
    response::Response,
};
use tracing::warn;

use crate::domain::{
    tenant::TenantContext,
    url::{INDEX_OP, SITE_CONTEXT, canonical_context},
};

use super::{
    env::RoutingEnv,
    error::{RoutingError, UrlError, not_found, redirect, url_failure},
    handler::{Args, AuthorizationFailure, HandlerInvocation},
    link::{ContextOverride, LinkParts, UrlSpec, compose, local_redirect},
    parser::{LOCALE_PARAM, OP_PARAM, PAGE_PARAM, PATH_PARAM},
    registry::StrategyKind,
    request::RouteRequest,
    strategy::{Resolution, RouterStrategy, session_or_primary_locale},
};

pub const INSTALL_PAGE: &str = "install";
pub const LOGIN_PAGE: &str = "login";
pub const USER_PAGE: &str = "user";
pub const SET_LOCALE_OP: &str = "setLocale";
pub const AUTHORIZATION_DENIED_OP: &str = "authorizationDenied";

/// Pages reachable before installation completes.
const INSTALL_PAGES: &[&str] = &[INSTALL_PAGE, "help"];
const SET_LOCALE_PARAM: &str = "setLocale";
const SOURCE_PARAM: &str = "source";
const MESSAGE_PARAM: &str = "message";
const STRATEGY: &str = "page";

/// Attached to redirect responses when the caller explicitly switched locale, for the
/// session layer to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleChange {
    pub locale: String,
}

pub struct PageRouter {
    env: Arc<RoutingEnv>,
    cacheable_pages: Vec<String>,
}

impl PageRouter {
    pub fn new(env: Arc<RoutingEnv>, cacheable_pages: Vec<String>) -> Self {
        Self {
            env,
            cacheable_pages,
        }
    }

    /// The requested page, or the configured default when the URL names none.
    pub fn requested_page<'a>(&'a self, request: &'a RouteRequest) -> &'a str {
        request
            .parsed()
            .page()
            .unwrap_or(&self.env.settings.default_page)
    }

    fn explicit_locale<'a>(&self, request: &'a RouteRequest, page: &str) -> Option<&'a str> {
        let parsed = request.parsed();
        if page == USER_PAGE && parsed.op() == SET_LOCALE_OP {
            parsed.args().first().map(String::as_str)
        } else if page == INSTALL_PAGE {
            parsed.query_param(SET_LOCALE_PARAM)
        } else {
            None
        }
    }

    async fn redirect_to(&self, request: &RouteRequest, spec: &UrlSpec) -> Response {
        match self.build_url(request, spec).await {
            Ok(url) => redirect(&url),
            Err(err) => url_failure(&err),
        }
    }

    async fn current_tenant(&self, request: &RouteRequest) -> TenantContext {
        match self.env.tenants.current(request).await {
            Ok(context) => context,
            Err(err) => {
                warn!(
                    target = "folio::routing::page",
                    error = %err,
                    result = "tenant_lookup_failed",
                    "Falling back to site context"
                );
                TenantContext::Site
            }
        }
    }

    /// Redirect after an explicit locale switch: back to a local `source`, or to the
    /// index page in the new locale.
    async fn locale_switch(&self, request: &RouteRequest, page: &str, locale: &str) -> Response {
        let target = request
            .parsed()
            .query_param(SOURCE_PARAM)
            .filter(|_| page == USER_PAGE)
            .and_then(|source| local_redirect(request.base_url(), source));

        let mut response = match target {
            Some(target) => redirect(&target),
            None => {
                let landing = if page == INSTALL_PAGE {
                    INSTALL_PAGE
                } else {
                    &self.env.settings.default_page
                };
                self.redirect_to(request, &UrlSpec::new().page(landing).locale(locale))
                    .await
            }
        };
        response.extensions_mut().insert(LocaleChange {
            locale: locale.to_string(),
        });
        response
    }
}

#[async_trait]
impl RouterStrategy for PageRouter {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Page
    }

    async fn supports(&self, _request: &RouteRequest) -> bool {
        true
    }

    fn validates(&self) -> bool {
        false
    }

    async fn resolve(&self, request: &RouteRequest) -> Result<Resolution, RoutingError> {
        let settings = &self.env.settings;
        let parsed = request.parsed();
        let page = self.requested_page(request);

        if !settings.installed {
            if !INSTALL_PAGES.contains(&page) {
                let spec = UrlSpec::new().context(SITE_CONTEXT).page(INSTALL_PAGE);
                return Ok(Resolution::Respond(self.redirect_to(request, &spec).await));
            }
        } else if page == INSTALL_PAGE {
            let spec = UrlSpec::new().page(settings.default_page.clone());
            return Ok(Resolution::Respond(self.redirect_to(request, &spec).await));
        }

        let context = self.env.tenants.current(request).await?;
        if parsed.context() != SITE_CONTEXT && context.is_site() {
            return Ok(Resolution::Respond(not_found(format!(
                "unknown tenant `{}`",
                parsed.context()
            ))));
        }

        if context.is_disabled() && request.principal().is_none() && page != LOGIN_PAGE {
            let spec = UrlSpec::new().page(LOGIN_PAGE);
            return Ok(Resolution::Respond(self.redirect_to(request, &spec).await));
        }

        let site = self.env.site_locales();
        if let Some(requested) = self.explicit_locale(request, page) {
            if context.supports_locale(site, requested) {
                return Ok(Resolution::Respond(
                    self.locale_switch(request, page, requested).await,
                ));
            }
        }

        let locale = self.active_locale(request).await;
        if request.method() == Method::GET
            && context.is_multilingual(site)
            && parsed.locale() != Some(locale.as_str())
        {
            let spec = UrlSpec {
                locale: Some(locale),
                params: parsed.query().to_vec(),
                ..UrlSpec::default()
            };
            return Ok(Resolution::Respond(self.redirect_to(request, &spec).await));
        }

        let Some(handler) = self.env.registry.resolve(StrategyKind::Page, page, request) else {
            return Ok(Resolution::Respond(not_found(format!(
                "page `{page}` is not registered"
            ))));
        };

        let op = parsed.op().to_string();
        let roles = handler.role_assignments().for_op(&op).to_vec();
        Ok(Resolution::Invoke(HandlerInvocation {
            handler,
            handler_id: page.to_string(),
            op,
            args: Args::positional(parsed.args().to_vec()),
            roles,
        }))
    }

    /// Locale in the URL when the tenant supports it, else the session's, else the
    /// tenant's primary locale.
    async fn active_locale(&self, request: &RouteRequest) -> String {
        if let Some(locale) = request.locale() {
            return locale.to_string();
        }
        let context = self.current_tenant(request).await;
        let site = self.env.site_locales();
        let locale = match request.parsed().locale() {
            Some(locale) if context.supports_locale(site, locale) => locale.to_string(),
            _ => session_or_primary_locale(&self.env, request, &context),
        };
        request.remember_locale(locale).to_string()
    }

    async fn is_cacheable(&self, request: &RouteRequest) -> bool {
        let settings = &self.env.settings;
        let safe_method = request.method() == Method::GET || request.method() == Method::HEAD;
        settings.sessions_enabled
            && request.session().is_none()
            && settings.installed
            && !settings.maintenance
            && safe_method
            && request.body().is_empty()
            && request.principal().is_none()
            && !request.has_raw_query()
            && self
                .cacheable_pages
                .iter()
                .any(|page| page == self.requested_page(request))
    }

    async fn handle_authorization_failure(
        &self,
        request: &RouteRequest,
        failure: &AuthorizationFailure,
    ) -> Response {
        let spec = if request.principal().is_none() {
            UrlSpec::new()
                .page(LOGIN_PAGE)
                .param(SOURCE_PARAM, request.path_and_query())
        } else {
            UrlSpec::new()
                .page(USER_PAGE)
                .op(AUTHORIZATION_DENIED_OP)
                .param(MESSAGE_PARAM, failure.message_key.clone())
        };
        self.redirect_to(request, &spec).await
    }

    fn not_found(&self, _request: &RouteRequest, detail: &str) -> Response {
        not_found(detail)
    }

    /// Unset fields inherit from the current request, outermost first: a new context
    /// drops page, op and args; a new page drops op and args; a new op drops args.
    async fn build_url(&self, request: &RouteRequest, spec: &UrlSpec) -> Result<String, UrlError> {
        let parsed = request.parsed();
        let current = parsed.context();
        let context = match &spec.context {
            None => current.to_string(),
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
        let inherit = context == current;

        let page = spec
            .endpoint
            .clone()
            .or_else(|| inherit.then(|| parsed.page().map(str::to_string)).flatten());
        let op = spec.op.clone().or_else(|| {
            (inherit && spec.endpoint.is_none()).then(|| parsed.op().to_string())
        });
        let args = match &spec.path {
            Some(path) => path.clone(),
            None if inherit && spec.endpoint.is_none() && spec.op.is_none() => {
                parsed.args().to_vec()
            }
            None => Vec::new(),
        };

        let target = self
            .env
            .tenants
            .resolve(request, &context)
            .await
            .map_err(|err| UrlError::Tenant(err.to_string()))?;
        let site = self.env.site_locales();
        let locale = if target.is_multilingual(site) {
            let candidate = match &spec.locale {
                Some(locale) => locale.clone(),
                None => self.active_locale(request).await,
            };
            if target.supports_locale(site, &candidate) {
                Some(candidate)
            } else {
                Some(target.primary_locale(site).to_string())
            }
        } else {
            None
        };

        let default_page = &self.env.settings.default_page;
        let op = op.filter(|op| !(op == INDEX_OP && args.is_empty()));
        let page = page.filter(|page| !(page == default_page && op.is_none() && args.is_empty()));

        let mut segments = Vec::new();
        let mut routing_params = Vec::new();
        if let Some(locale) = locale {
            segments.push(locale.clone());
            routing_params.push((LOCALE_PARAM.to_string(), locale));
        }
        if page.is_some() || op.is_some() || !args.is_empty() {
            let page = page.unwrap_or_else(|| default_page.clone());
            segments.push(page.clone());
            routing_params.push((PAGE_PARAM.to_string(), page));
            if op.is_some() || !args.is_empty() {
                let op = op.unwrap_or_else(|| INDEX_OP.to_string());
                segments.push(op.clone());
                routing_params.push((OP_PARAM.to_string(), op));
                for arg in args {
                    segments.push(arg.clone());
                    routing_params.push((PATH_PARAM.to_string(), arg));
                }
            }
        }

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

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};

    use super::*;
    use crate::{
        config::RoutingSettings,
        domain::identity::Session,
        routing::{
            registry::HandlerRegistry,
            request::IncomingRequest,
            testing::{anonymous_session, env_with, route_request},
        },
    };

    fn router(settings: RoutingSettings) -> PageRouter {
        PageRouter::new(
            env_with(settings, HandlerRegistry::new()),
            vec!["about".to_string()],
        )
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    async fn respond(router: &PageRouter, request: &RouteRequest) -> Response {
        match router.resolve(request).await.expect("resolves") {
            Resolution::Respond(response) => response,
            Resolution::Invoke(invocation) => {
                panic!("unexpected invocation of `{}`", invocation.handler_id)
            }
        }
    }

    #[tokio::test]
    async fn urls_round_trip_without_overrides() {
        let router = router(RoutingSettings::default());
        let request = route_request(IncomingRequest::get("/demo/en/workflow/show/3"));
        let url = router
            .build_url(&request, &UrlSpec::new())
            .await
            .expect("url");
        assert_eq!(url, "http://localhost/index.php/demo/en/workflow/show/3");
    }

    #[tokio::test]
    async fn index_segments_are_elided() {
        let router = router(RoutingSettings::default());
        let request = route_request(IncomingRequest::get("/demo/en/workflow/show/3"));

        let url = router
            .build_url(&request, &UrlSpec::new().page("index"))
            .await
            .expect("url");
        assert_eq!(url, "http://localhost/index.php/demo/en");

        let url = router
            .build_url(&request, &UrlSpec::new().op("index"))
            .await
            .expect("url");
        assert_eq!(url, "http://localhost/index.php/demo/en/workflow");
    }

    #[tokio::test]
    async fn new_context_drops_page_and_locale_for_monolingual_tenant() {
        let router = router(RoutingSettings::default());
        let request = route_request(IncomingRequest::get("/demo/en/workflow/show/3"));
        let url = router
            .build_url(
                &request,
                &UrlSpec::new().context("mono").param("a", "1").param("b", "2").escaped(),
            )
            .await
            .expect("url");
        assert_eq!(url, "http://localhost/index.php/mono?a=1&amp;b=2");
    }

    #[tokio::test]
    async fn multi_level_context_is_rejected() {
        let router = router(RoutingSettings::default());
        let request = route_request(IncomingRequest::get("/demo"));
        let err = router
            .build_url(&request, &UrlSpec::new().context_levels(["a", "b"]))
            .await
            .expect_err("two levels");
        assert_eq!(
            err,
            UrlError::ContextLevels {
                strategy: "page",
                levels: 2
            }
        );
    }

    #[tokio::test]
    async fn restful_query_mode_urls_carry_routing_params() {
        let settings = RoutingSettings {
            path_info: false,
            restful_urls: true,
            ..RoutingSettings::default()
        };
        let router = router(settings);
        let request = route_request(IncomingRequest::get("/demo/en/workflow/show/3"));
        let url = router.build_url(&request, &UrlSpec::new()).await.expect("url");
        assert_eq!(
            url,
            "http://localhost/?context=demo&locale=en&page=workflow&op=show&path%5B%5D=3"
        );
    }

    #[tokio::test]
    async fn uninstalled_site_redirects_to_installer() {
        let router = router(RoutingSettings {
            installed: false,
            ..RoutingSettings::default()
        });
        let request = route_request(IncomingRequest::get("/demo/en/about"));
        let response = respond(&router, &request).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "http://localhost/index.php/index/install");
    }

    #[tokio::test]
    async fn installed_site_redirects_installer_to_index() {
        let router = router(RoutingSettings::default());
        let request = route_request(IncomingRequest::get("/index/install"));
        let response = respond(&router, &request).await;
        assert_eq!(location(&response), "http://localhost/index.php/index");
    }

    #[tokio::test]
    async fn missing_locale_redirects_with_active_locale() {
        let router = router(RoutingSettings::default());
        let request = route_request(
            IncomingRequest::get("/demo/about?x=1").with_session(Session {
                principal: None,
                locale: Some("fr_CA".to_string()),
            }),
        );
        let response = respond(&router, &request).await;
        assert_eq!(
            location(&response),
            "http://localhost/index.php/demo/fr_CA/about?x=1"
        );
    }

    #[tokio::test]
    async fn explicit_locale_switch_redirects_to_source() {
        let router = router(RoutingSettings::default());
        let request = route_request(IncomingRequest::get(
            "/demo/en/user/setLocale/fr_CA?source=%2Fdemo%2Ffr_CA%2Fabout",
        ));
        let response = respond(&router, &request).await;
        assert_eq!(location(&response), "http://localhost/demo/fr_CA/about");
        assert_eq!(
            response.extensions().get::<LocaleChange>(),
            Some(&LocaleChange {
                locale: "fr_CA".to_string()
            })
        );
    }

    #[tokio::test]
    async fn external_source_is_not_followed() {
        let router = router(RoutingSettings::default());
        let request = route_request(IncomingRequest::get(
            "/demo/en/user/setLocale/fr_CA?source=%2F%2Fevil.example",
        ));
        let response = respond(&router, &request).await;
        assert_eq!(location(&response), "http://localhost/index.php/demo/fr_CA");
    }

    #[tokio::test]
    async fn backslash_source_cannot_reach_another_host() {
        let router = router(RoutingSettings::default());
        let request = route_request(IncomingRequest::get(
            "/demo/en/user/setLocale/fr_CA?source=%2F%5Cevil.example%2Fpwn",
        ));
        let response = respond(&router, &request).await;
        assert_eq!(location(&response), "http://localhost/index.php/demo/fr_CA");
    }

    #[tokio::test]
    async fn cacheability_requires_anonymous_plain_get() {
        let router = router(RoutingSettings::default());

        let plain = route_request(IncomingRequest::get("/demo/en/about"));
        assert!(router.is_cacheable(&plain).await);

        let with_query = route_request(IncomingRequest::get("/demo/en/about?x=1"));
        assert!(!router.is_cacheable(&with_query).await);

        let with_session = route_request(
            IncomingRequest::get("/demo/en/about").with_session(anonymous_session()),
        );
        assert!(!router.is_cacheable(&with_session).await);

        let other_page = route_request(IncomingRequest::get("/demo/en/workflow"));
        assert!(!router.is_cacheable(&other_page).await);

        let post = route_request(IncomingRequest::get("/demo/en/about").with_method(Method::POST));
        assert!(!router.is_cacheable(&post).await);
    }
}
