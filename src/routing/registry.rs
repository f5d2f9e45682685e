//! Explicit handler registry.
//!
//! Handlers are registered up front under a strategy-specific identifier. Interceptors
//! are consulted first, so hooks can take over a request before the registry is.

use std::{collections::HashMap, fmt, sync::Arc};

use super::{handler::Handler, request::RouteRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Page,
    Api,
    Component,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Page => "page",
            StrategyKind::Api => "api",
            StrategyKind::Component => "component",
        }
    }
}

/// Builds a fresh handler for one request.
pub type HandlerFactory = Arc<dyn Fn() -> Arc<dyn Handler> + Send + Sync>;

/// Hook that can supply a handler in place of the registered one.
///
/// Component strategies consult interceptors from `supports`, so implementations
/// must not have side effects.
pub trait Interceptor: Send + Sync {
    fn intercept(
        &self,
        kind: StrategyKind,
        id: &str,
        request: &RouteRequest,
    ) -> Option<Arc<dyn Handler>>;
}

/// Registry key for an API entity module.
pub fn api_handler_id(plugin: Option<(&str, &str)>, version: &str, entity: &str) -> String {
    match plugin {
        Some((category, name)) => format!("plugins/{category}/{name}/{version}/{entity}"),
        None => format!("{version}/{entity}"),
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(StrategyKind, String), HandlerFactory>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, kind: StrategyKind, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Handler> + Send + Sync + 'static,
    {
        self.handlers.insert((kind, id.into()), Arc::new(factory));
    }

    /// Register a page handler under its page identifier, e.g. `workflow`.
    pub fn register_page<F>(&mut self, page: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Handler> + Send + Sync + 'static,
    {
        self.register(StrategyKind::Page, page, factory);
    }

    pub fn register_api<F>(&mut self, version: &str, entity: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Handler> + Send + Sync + 'static,
    {
        self.register(
            StrategyKind::Api,
            api_handler_id(None, version, entity),
            factory,
        );
    }

    pub fn register_plugin_api<F>(
        &mut self,
        plugin: (&str, &str),
        version: &str,
        entity: &str,
        factory: F,
    ) where
        F: Fn() -> Arc<dyn Handler> + Send + Sync + 'static,
    {
        self.register(
            StrategyKind::Api,
            api_handler_id(Some(plugin), version, entity),
            factory,
        );
    }

    /// Register an RPC component under its dotted identifier, e.g.
    /// `grid.users.UserGridHandler`.
    pub fn register_component<F>(&mut self, id: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Handler> + Send + Sync + 'static,
    {
        self.register(StrategyKind::Component, id, factory);
    }

    pub fn add_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Interceptors in registration order, then the registry itself.
    pub fn resolve(
        &self,
        kind: StrategyKind,
        id: &str,
        request: &RouteRequest,
    ) -> Option<Arc<dyn Handler>> {
        self.interceptors
            .iter()
            .find_map(|interceptor| interceptor.intercept(kind, id, request))
            .or_else(|| {
                self.handlers
                    .get(&(kind, id.to_string()))
                    .map(|factory| factory())
            })
    }

    /// Registered identifiers for `kind`, sorted.
    pub fn ids(&self, kind: StrategyKind) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .handlers
            .keys()
            .filter(|(registered, _)| *registered == kind)
            .map(|(_, id)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("pages", &self.ids(StrategyKind::Page))
            .field("api", &self.ids(StrategyKind::Api))
            .field("components", &self.ids(StrategyKind::Component))
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::routing::{
        handler::{Args, HandlerError, HandlerOutput},
        request::IncomingRequest,
        testing::route_request,
    };

    struct Named(&'static str);

    #[async_trait]
    impl Handler for Named {
        fn operations(&self) -> &[&'static str] {
            &["index"]
        }

        async fn invoke(
            &self,
            _op: &str,
            _request: &RouteRequest,
            _args: &Args,
        ) -> Result<HandlerOutput, HandlerError> {
            Ok(HandlerOutput::Text(self.0.to_string()))
        }
    }

    struct Takeover;

    impl Interceptor for Takeover {
        fn intercept(
            &self,
            kind: StrategyKind,
            id: &str,
            _request: &RouteRequest,
        ) -> Option<Arc<dyn Handler>> {
            (kind == StrategyKind::Page && id == "about")
                .then(|| Arc::new(Named("plugin")) as Arc<dyn Handler>)
        }
    }

    async fn text_of(handler: Arc<dyn Handler>, request: &RouteRequest) -> String {
        match handler.invoke("index", request, &Args::default()).await {
            Ok(HandlerOutput::Text(text)) => text,
            _ => String::new(),
        }
    }

    #[tokio::test]
    async fn interceptors_win_over_registered_handlers() {
        let mut registry = HandlerRegistry::new();
        registry.register_page("about", || Arc::new(Named("core")));
        registry.register_page("help", || Arc::new(Named("help")));
        registry.add_interceptor(Arc::new(Takeover));

        let request = route_request(IncomingRequest::get("/demo/about"));
        let about = registry
            .resolve(StrategyKind::Page, "about", &request)
            .expect("about resolves");
        assert_eq!(text_of(about, &request).await, "plugin");

        let help = registry
            .resolve(StrategyKind::Page, "help", &request)
            .expect("help resolves");
        assert_eq!(text_of(help, &request).await, "help");

        assert!(
            registry
                .resolve(StrategyKind::Api, "about", &request)
                .is_none()
        );
    }

    #[test]
    fn api_ids_include_plugin_prefix() {
        assert_eq!(api_handler_id(None, "v1", "submissions"), "v1/submissions");
        assert_eq!(
            api_handler_id(Some(("generic", "citations")), "v1", "refs"),
            "plugins/generic/citations/v1/refs"
        );
    }
}
