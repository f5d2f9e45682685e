//! Request values flowing through the dispatcher.

use std::{
    borrow::Cow,
    collections::HashMap,
    sync::{Mutex, OnceLock},
};

use axum::http::{HeaderMap, Method, header, request::Parts};
use bytes::Bytes;

use crate::{
    cache::http_date,
    domain::{
        identity::{Principal, Session},
        tenant::TenantContext,
        url::ParsedUrl,
    },
    util::lock::mutex_lock,
};

use super::handler::ServiceEndpoint;

/// Cache-key stand-in for requests without path info.
pub const SITE_PATH_SENTINEL: &str = "site";

/// Raw inbound request as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub session: Option<Session>,
}

impl IncomingRequest {
    /// A bodyless GET for `path_and_query`, e.g. `/demo/en/about?x=1`.
    pub fn get(path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (path_and_query.to_string(), None),
        };
        Self {
            method: Method::GET,
            path,
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            session: None,
        }
    }

    pub fn from_parts(parts: &Parts, body: Bytes, session: Option<Session>) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
            body,
            session,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_header(mut self, name: header::HeaderName, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    /// Decoded query pairs in order of appearance.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A request after URL parsing, carrying per-request memoized routing state.
///
/// Memo slots are written at most once; the first stored value is the one every
/// later reader observes.
#[derive(Debug)]
pub struct RouteRequest {
    method: Method,
    path: String,
    raw_query: Option<String>,
    path_info: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    session: Option<Session>,
    base_url: String,
    parsed: ParsedUrl,
    tenants: Mutex<HashMap<String, TenantContext>>,
    locale: OnceLock<String>,
    router: OnceLock<String>,
    endpoint: OnceLock<ServiceEndpoint>,
}

impl RouteRequest {
    pub(crate) fn new(
        incoming: IncomingRequest,
        path_info: Option<String>,
        base_url: String,
        parsed: ParsedUrl,
    ) -> Self {
        Self {
            method: incoming.method,
            path: incoming.path,
            raw_query: incoming.query.filter(|query| !query.is_empty()),
            path_info,
            headers: incoming.headers,
            body: incoming.body,
            session: incoming.session,
            base_url,
            parsed,
            tenants: Mutex::new(HashMap::new()),
            locale: OnceLock::new(),
            router: OnceLock::new(),
            endpoint: OnceLock::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path plus the original query string, suitable for a `source` parameter.
    pub fn path_and_query(&self) -> String {
        match &self.raw_query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }

    /// True when the request carried no query string at all.
    pub fn has_raw_query(&self) -> bool {
        self.raw_query.is_some()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.session.as_ref()?.principal.as_ref()
    }

    pub fn session_locale(&self) -> Option<&str> {
        self.session.as_ref()?.locale.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn parsed(&self) -> &ParsedUrl {
        &self.parsed
    }

    /// Path info (script segment removed), or [`SITE_PATH_SENTINEL`] when there is none.
    pub fn path_info_or_site(&self) -> &str {
        self.path_info.as_deref().unwrap_or(SITE_PATH_SENTINEL)
    }

    /// Path identifying a cached page. When the host implied the tenant, the same path
    /// names a different page per tenant, so the tenant path is folded in.
    pub fn cache_path(&self) -> Cow<'_, str> {
        let path = self.path_info_or_site();
        if self.parsed.context_from_host() {
            Cow::Owned(format!("{}@{path}", self.parsed.context()))
        } else {
            Cow::Borrowed(path)
        }
    }

    /// Unix timestamp from `If-Modified-Since`, when present and well formed.
    pub fn if_modified_since(&self) -> Option<i64> {
        let value = self.headers.get(header::IF_MODIFIED_SINCE)?.to_str().ok()?;
        http_date::parse(value)
    }

    pub(crate) fn cached_tenant(&self, path: &str) -> Option<TenantContext> {
        mutex_lock(&self.tenants, "routing::request", "cached_tenant")
            .get(path)
            .cloned()
    }

    /// Memoize `context` for `path`, returning whichever value was stored first.
    pub(crate) fn remember_tenant(&self, path: &str, context: TenantContext) -> TenantContext {
        mutex_lock(&self.tenants, "routing::request", "remember_tenant")
            .entry(path.to_string())
            .or_insert(context)
            .clone()
    }

    /// The tenant resolved for the request's own context, once a strategy looked it up.
    pub fn tenant(&self) -> Option<TenantContext> {
        self.cached_tenant(self.parsed.context())
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.get().map(String::as_str)
    }

    pub(crate) fn remember_locale(&self, locale: String) -> &str {
        self.locale.get_or_init(|| locale)
    }

    /// Name of the strategy bound by the dispatcher.
    pub fn router_name(&self) -> Option<&str> {
        self.router.get().map(String::as_str)
    }

    pub(crate) fn bind_router(&self, name: &str) {
        let _ = self.router.set(name.to_string());
    }

    pub fn endpoint(&self) -> Option<&ServiceEndpoint> {
        self.endpoint.get()
    }

    pub(crate) fn remember_endpoint(&self, endpoint: ServiceEndpoint) {
        let _ = self.endpoint.set(endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::url::INDEX_OP;

    fn parsed() -> ParsedUrl {
        ParsedUrl::new(
            vec!["demo".to_string()],
            1,
            vec!["demo".to_string()],
            false,
            None,
            None,
            INDEX_OP.to_string(),
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn incoming_get_splits_query() {
        let incoming = IncomingRequest::get("/demo/about?a=1&b=two%20words");
        assert_eq!(incoming.path, "/demo/about");
        assert_eq!(
            incoming.query_pairs(),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two words".to_string())
            ]
        );
    }

    #[test]
    fn first_memoized_tenant_wins() {
        let request = RouteRequest::new(
            IncomingRequest::get("/demo"),
            Some("/demo".to_string()),
            "http://localhost".to_string(),
            parsed(),
        );
        assert!(request.tenant().is_none());
        request.remember_tenant("demo", TenantContext::Site);
        let again = request.remember_tenant("other", TenantContext::Site);
        assert_eq!(again, TenantContext::Site);
        assert_eq!(request.tenant(), Some(TenantContext::Site));
    }

    #[test]
    fn locale_and_router_are_set_once() {
        let request = RouteRequest::new(
            IncomingRequest::get("/"),
            None,
            "http://localhost".to_string(),
            parsed(),
        );
        assert_eq!(request.remember_locale("en".to_string()), "en");
        assert_eq!(request.remember_locale("fr_CA".to_string()), "en");
        request.bind_router("page");
        request.bind_router("api");
        assert_eq!(request.router_name(), Some("page"));
        assert_eq!(request.path_info_or_site(), SITE_PATH_SENTINEL);
    }

    #[test]
    fn if_modified_since_is_parsed() {
        let incoming = IncomingRequest::get("/demo")
            .with_header(header::IF_MODIFIED_SINCE, "Thu, 01 Jan 1970 00:01:40 GMT");
        let request = RouteRequest::new(
            incoming,
            Some("/demo".to_string()),
            "http://localhost".to_string(),
            parsed(),
        );
        assert_eq!(request.if_modified_since(), Some(100));
        assert!(!request.has_raw_query());
    }
}
