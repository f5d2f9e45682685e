//! Front controller: picks a strategy per request and fronts the page cache.

use std::sync::{Arc, OnceLock};

use axum::{http::header, response::Response};
use metrics::counter;
use tracing::{debug, error, info_span, Instrument};
use url::Url;

use crate::{
    cache::{CacheConfig, CacheKey, CacheLookup, ResponseCache, not_modified},
    config::Settings,
};

use super::{
    api::ApiRouter,
    component::ComponentRouter,
    env::RoutingEnv,
    error::{RoutingError, UrlError},
    link::{UrlSpec, same_origin},
    page::PageRouter,
    parser::{ParseOptions, UrlParser, parser_for, path_info},
    request::{IncomingRequest, RouteRequest},
    strategy::{Resolution, RouterStrategy},
};

pub const API_ROUTER: &str = "api";
pub const COMPONENT_ROUTER: &str = "component";
pub const PAGE_ROUTER: &str = "page";

const DEFAULT_BASE_URL: &str = "http://localhost";
const CONTEXT_DEPTH: usize = 1;

type RouterFactory = Box<dyn Fn(Arc<RoutingEnv>) -> Arc<dyn RouterStrategy> + Send + Sync>;

/// A named strategy slot, instantiated on first use.
struct RouterSlot {
    name: String,
    factory: RouterFactory,
    instance: OnceLock<Arc<dyn RouterStrategy>>,
}

impl RouterSlot {
    fn get(&self, env: &Arc<RoutingEnv>) -> Arc<dyn RouterStrategy> {
        self.instance
            .get_or_init(|| (self.factory)(Arc::clone(env)))
            .clone()
    }
}

pub struct DispatcherBuilder {
    env: Arc<RoutingEnv>,
    known_locales: Vec<String>,
    routers: Vec<RouterSlot>,
    cache: Option<ResponseCache>,
}

impl DispatcherBuilder {
    /// Append a strategy. Strategies are consulted in registration order.
    pub fn router<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(Arc<RoutingEnv>) -> Arc<dyn RouterStrategy> + Send + Sync + 'static,
    {
        self.routers.push(RouterSlot {
            name: name.to_string(),
            factory: Box::new(factory),
            instance: OnceLock::new(),
        });
        self
    }

    pub fn known_locales(mut self, locales: Vec<String>) -> Self {
        self.known_locales = locales;
        self
    }

    pub fn cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Dispatcher {
        let parser = parser_for(self.env.settings.path_info);
        let options = ParseOptions {
            context_depth: CONTEXT_DEPTH,
            script_name: self.env.settings.script_name.clone(),
            known_locales: self.known_locales,
            implied_context: None,
        };
        Dispatcher {
            env: self.env,
            parser,
            options,
            routers: self.routers,
            cache: self.cache,
        }
    }
}

pub struct Dispatcher {
    env: Arc<RoutingEnv>,
    parser: Box<dyn UrlParser>,
    options: ParseOptions,
    routers: Vec<RouterSlot>,
    cache: Option<ResponseCache>,
}

impl Dispatcher {
    pub fn builder(env: Arc<RoutingEnv>) -> DispatcherBuilder {
        DispatcherBuilder {
            env,
            known_locales: Vec::new(),
            routers: Vec::new(),
            cache: None,
        }
    }

    /// The stock strategy chain: API, then component RPC, then the catch-all page
    /// router. The page cache is attached when enabled in `settings`.
    pub fn standard(env: Arc<RoutingEnv>, settings: &Settings) -> Self {
        let cache = CacheConfig::from(&settings.cache);
        let cacheable_pages = cache.cacheable_pages.clone();
        let mut builder = Self::builder(env)
            .known_locales(settings.known_locales())
            .router(API_ROUTER, |env| Arc::new(ApiRouter::new(env)))
            .router(COMPONENT_ROUTER, |env| Arc::new(ComponentRouter::new(env)))
            .router(PAGE_ROUTER, move |env| {
                Arc::new(PageRouter::new(env, cacheable_pages.clone()))
            });
        if cache.enabled {
            builder = builder.cache(ResponseCache::new(cache));
        }
        builder.build()
    }

    pub fn env(&self) -> &Arc<RoutingEnv> {
        &self.env
    }

    pub fn parser_mode(&self) -> &'static str {
        self.parser.mode()
    }

    pub fn router_names(&self) -> Vec<&str> {
        self.routers.iter().map(|slot| slot.name.as_str()).collect()
    }

    pub fn router(&self, name: &str) -> Option<Arc<dyn RouterStrategy>> {
        self.routers
            .iter()
            .find(|slot| slot.name == name)
            .map(|slot| slot.get(&self.env))
    }

    /// Parse an incoming request into its routing form.
    pub fn prepare(&self, incoming: IncomingRequest) -> RouteRequest {
        let base_url = self.base_url(&incoming);
        let (implied_context, local_path) = match self.implied_context(&base_url, &incoming.path)
        {
            Some((tenant, rest)) => (Some(tenant), rest),
            None => (None, incoming.path.clone()),
        };
        let options = ParseOptions {
            implied_context,
            ..self.options.clone()
        };
        let query = incoming.query_pairs();
        let parsed = self.parser.parse(&local_path, &query, &options);
        let info = path_info(&local_path, &self.options.script_name);
        RouteRequest::new(incoming, info, base_url, parsed)
    }

    /// Route `request` to the first strategy that supports it.
    pub async fn dispatch(&self, request: &RouteRequest) -> Result<Response, RoutingError> {
        let (name, router) = self.select(request).await?;
        let span = info_span!("dispatch", router = name, context = request.parsed().context());

        async move {
            counter!("folio_dispatch_total", "router" => name.to_string()).increment(1);

            let Some(cache) = self.cache.as_ref() else {
                return router.route(request).await;
            };
            if !router.is_cacheable(request).await {
                return router.route(request).await;
            }

            let locale = router.active_locale(request).await;
            let key = CacheKey::derive(&request.cache_path(), &locale);
            match cache.lookup(&key, request.if_modified_since()).await {
                CacheLookup::Fresh(page) => return Ok(page.into_response()),
                CacheLookup::NotModified => return Ok(not_modified()),
                CacheLookup::Miss => {}
            }
            let response = router.route(request).await?;
            Ok(cache.capture(&key, response).await)
        }
        .instrument(span)
        .await
    }

    /// Resolve without invoking any handler; used for diagnostics.
    pub async fn inspect(
        &self,
        request: &RouteRequest,
    ) -> Result<(&str, Resolution), RoutingError> {
        let (name, router) = self.select(request).await?;
        let resolution = router.resolve(request).await?;
        Ok((name, resolution))
    }

    /// Build a URL through the named strategy, or through the one bound to `request`.
    pub async fn url(
        &self,
        request: &RouteRequest,
        router: Option<&str>,
        spec: &UrlSpec,
    ) -> Result<String, UrlError> {
        let name = match router {
            Some(name) => name,
            None => request.router_name().ok_or(UrlError::Unbound)?,
        };
        let strategy = self
            .router(name)
            .ok_or_else(|| UrlError::UnknownRouter(name.to_string()))?;
        strategy.build_url(request, spec).await
    }

    async fn select(
        &self,
        request: &RouteRequest,
    ) -> Result<(&str, Arc<dyn RouterStrategy>), RoutingError> {
        for slot in &self.routers {
            let router = slot.get(&self.env);
            if router.supports(request).await {
                request.bind_router(&slot.name);
                debug!(router = %slot.name, path = request.path(), "Router selected");
                return Ok((slot.name.as_str(), router));
            }
        }
        error!(
            target = "folio::routing::dispatcher",
            path = request.path(),
            routers = ?self.router_names(),
            result = "no_strategy",
            "No router strategy supports the request"
        );
        Err(RoutingError::NoStrategy {
            path: request.path().to_string(),
        })
    }

    /// Configured base URL, else one derived from the `Host` header.
    fn base_url(&self, incoming: &IncomingRequest) -> String {
        if let Some(base) = self.env.settings.base_url.as_ref() {
            return base.clone();
        }
        incoming
            .headers
            .get(header::HOST)
            .and_then(|host| host.to_str().ok())
            .map(|host| format!("http://{host}"))
            .filter(|candidate| Url::parse(candidate).is_ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Tenant whose base URL override prefixes the request URL, with the request path
    /// left after the override's own path. The longest matching override wins.
    fn implied_context(&self, base_url: &str, path: &str) -> Option<(String, String)> {
        let base = Url::parse(base_url).ok()?;
        self.env
            .settings
            .base_url_overrides
            .iter()
            .filter_map(|(tenant, override_base)| {
                let override_base = Url::parse(override_base).ok()?;
                if !same_origin(&base, &override_base) {
                    return None;
                }
                let prefix = override_base.path().trim_end_matches('/');
                let rest = strip_path_prefix(path, prefix)?;
                Some((prefix.len(), tenant, rest))
            })
            .max_by_key(|(prefix_len, _, _)| *prefix_len)
            .map(|(_, tenant, rest)| (tenant.clone(), rest))
    }
}

/// `path` without a segment-aligned `prefix`, always rooted at `/`.
fn strip_path_prefix(path: &str, prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RoutingSettings;

    use super::super::{registry::HandlerRegistry, testing::env_with};
    use super::*;

    fn pages(env: Arc<RoutingEnv>) -> Arc<dyn RouterStrategy> {
        Arc::new(PageRouter::new(env, Vec::new()))
    }

    #[tokio::test]
    async fn first_supporting_router_wins() {
        let env = env_with(RoutingSettings::default(), HandlerRegistry::new());
        let dispatcher = Dispatcher::builder(env)
            .router("first", pages)
            .router("second", pages)
            .build();
        let request = dispatcher.prepare(IncomingRequest::get("/index.php/mono/about"));
        let (name, _) = dispatcher.inspect(&request).await.expect("resolved");
        assert_eq!(name, "first");
        assert_eq!(request.router_name(), Some("first"));
    }

    #[tokio::test]
    async fn unclaimed_request_is_a_no_strategy_error() {
        let env = env_with(RoutingSettings::default(), HandlerRegistry::new());
        let dispatcher = Dispatcher::builder(env)
            .router(API_ROUTER, |env| Arc::new(ApiRouter::new(env)))
            .build();
        let request = dispatcher.prepare(IncomingRequest::get("/index.php/mono/about"));
        let err = dispatcher.dispatch(&request).await.expect_err("no router");
        assert!(matches!(err, RoutingError::NoStrategy { .. }));
        assert_eq!(request.router_name(), None);
    }

    #[test]
    fn base_url_falls_back_to_host_header() {
        let env = env_with(RoutingSettings::default(), HandlerRegistry::new());
        let dispatcher = Dispatcher::builder(env).router(PAGE_ROUTER, pages).build();

        let request = dispatcher
            .prepare(IncomingRequest::get("/").with_header(header::HOST, "journals.example:8080"));
        assert_eq!(request.base_url(), "http://journals.example:8080");

        let request = dispatcher.prepare(IncomingRequest::get("/"));
        assert_eq!(request.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn override_host_implies_the_tenant() {
        let mut settings = RoutingSettings::default();
        settings
            .base_url_overrides
            .insert("mono".to_string(), "http://mono.example".to_string());
        let env = env_with(settings, HandlerRegistry::new());
        let dispatcher = Dispatcher::builder(env).router(PAGE_ROUTER, pages).build();

        let request = dispatcher.prepare(
            IncomingRequest::get("/index.php/about").with_header(header::HOST, "mono.example"),
        );
        assert_eq!(request.parsed().context(), "mono");
        assert!(request.parsed().context_from_host());
        assert_eq!(request.parsed().page(), Some("about"));
    }

    fn shared_host_settings() -> RoutingSettings {
        let mut settings = RoutingSettings {
            base_url: Some("http://localhost".to_string()),
            ..RoutingSettings::default()
        };
        settings
            .base_url_overrides
            .insert("demo".to_string(), "http://localhost/demo".to_string());
        settings
    }

    #[test]
    fn override_with_path_only_claims_its_prefix() {
        let env = env_with(shared_host_settings(), HandlerRegistry::new());
        let dispatcher = Dispatcher::builder(env).router(PAGE_ROUTER, pages).build();

        let request = dispatcher.prepare(IncomingRequest::get("/index.php/mono/workflow/show/3"));
        assert_eq!(request.parsed().context(), "mono");
        assert!(!request.parsed().context_from_host());
        assert_eq!(request.parsed().page(), Some("workflow"));
        assert_eq!(request.parsed().op(), "show");

        let request = dispatcher.prepare(IncomingRequest::get("/demonstration/index.php/about"));
        assert_eq!(request.parsed().context(), "demonstration");
        assert!(!request.parsed().context_from_host());
    }

    #[tokio::test]
    async fn urls_built_under_a_path_override_parse_back() {
        let env = env_with(shared_host_settings(), HandlerRegistry::new());
        let dispatcher = Dispatcher::builder(env)
            .known_locales(vec!["en".to_string(), "fr_CA".to_string()])
            .router(PAGE_ROUTER, pages)
            .build();

        let current = dispatcher.prepare(IncomingRequest::get("/index.php/mono/about"));
        let url = dispatcher
            .url(
                &current,
                Some(PAGE_ROUTER),
                &UrlSpec::new().context("demo").page("workflow").op("show").path(["3"]),
            )
            .await
            .expect("url");
        assert_eq!(url, "http://localhost/demo/index.php/en/workflow/show/3");

        let request =
            dispatcher.prepare(IncomingRequest::get("/demo/index.php/en/workflow/show/3"));
        assert_eq!(request.parsed().context(), "demo");
        assert!(request.parsed().context_from_host());
        assert_eq!(request.parsed().locale(), Some("en"));
        assert_eq!(request.parsed().page(), Some("workflow"));
        assert_eq!(request.parsed().op(), "show");
        assert_eq!(request.parsed().args(), ["3"]);
        assert_eq!(request.path_info_or_site(), "/en/workflow/show/3");
    }

    #[test]
    fn implied_tenant_is_part_of_the_cache_path() {
        let mut settings = RoutingSettings::default();
        settings
            .base_url_overrides
            .insert("mono".to_string(), "http://mono.example".to_string());
        let env = env_with(settings, HandlerRegistry::new());
        let dispatcher = Dispatcher::builder(env).router(PAGE_ROUTER, pages).build();

        let on_tenant_host = dispatcher
            .prepare(IncomingRequest::get("/index.php").with_header(header::HOST, "mono.example"));
        let on_site_host = dispatcher
            .prepare(IncomingRequest::get("/index.php").with_header(header::HOST, "site.example"));
        assert_eq!(on_tenant_host.cache_path(), "mono@site");
        assert_eq!(on_site_host.cache_path(), "site");
    }

    #[test]
    fn path_prefix_must_end_on_a_segment() {
        assert_eq!(strip_path_prefix("/demo", "/demo").as_deref(), Some("/"));
        assert_eq!(strip_path_prefix("/demo/x", "/demo").as_deref(), Some("/x"));
        assert_eq!(strip_path_prefix("/demos/x", "/demo"), None);
        assert_eq!(strip_path_prefix("/x", "").as_deref(), Some("/x"));
    }
}
