//! Tenant resolution from context paths, memoized per request.

use std::sync::Arc;

use tracing::debug;

use crate::{
    application::repos::{RepoError, TenantRepo},
    domain::{tenant::TenantContext, url::SITE_CONTEXT},
};

use super::request::RouteRequest;

#[derive(Clone)]
pub struct TenantResolver {
    repo: Arc<dyn TenantRepo>,
}

impl TenantResolver {
    pub fn new(repo: Arc<dyn TenantRepo>) -> Self {
        Self { repo }
    }

    /// Resolve `path` for this request.
    ///
    /// The site sentinel never hits the repository, and an unknown path falls back to
    /// the site context. The first answer for a path is reused for the rest of the
    /// request.
    pub async fn resolve(
        &self,
        request: &RouteRequest,
        path: &str,
    ) -> Result<TenantContext, RepoError> {
        if path == SITE_CONTEXT {
            return Ok(TenantContext::Site);
        }
        if let Some(context) = request.cached_tenant(path) {
            return Ok(context);
        }

        let context = match self.repo.find_by_path(path).await? {
            Some(tenant) => TenantContext::Tenant(Arc::new(tenant)),
            None => {
                debug!(
                    target = "folio::routing::tenant",
                    tenant_path = path,
                    result = "unknown",
                    "Unknown tenant path, using site context"
                );
                TenantContext::Site
            }
        };
        Ok(request.remember_tenant(path, context))
    }

    /// Resolve the tenant named by the request's own context segment.
    pub async fn current(&self, request: &RouteRequest) -> Result<TenantContext, RepoError> {
        self.resolve(request, request.parsed().context()).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        domain::tenant::Tenant,
        routing::{request::IncomingRequest, testing::{demo_tenant, route_request}},
    };

    #[derive(Default)]
    struct CountingRepo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TenantRepo for CountingRepo {
        async fn find_by_path(&self, path: &str) -> Result<Option<Tenant>, RepoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((path == "demo").then(|| demo_tenant(true)))
        }
    }

    #[tokio::test]
    async fn lookups_are_memoized_per_request() {
        let repo = Arc::new(CountingRepo::default());
        let resolver = TenantResolver::new(repo.clone());
        let request = route_request(IncomingRequest::get("/demo/about"));

        let first = resolver.current(&request).await.expect("resolves");
        let second = resolver.current(&request).await.expect("resolves");
        assert_eq!(first, second);
        assert_eq!(first.path(), "demo");
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn site_sentinel_skips_repository() {
        let repo = Arc::new(CountingRepo::default());
        let resolver = TenantResolver::new(repo.clone());
        let request = route_request(IncomingRequest::get("/"));

        let context = resolver.current(&request).await.expect("resolves");
        assert!(context.is_site());
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_paths_fall_back_to_site() {
        let resolver = TenantResolver::new(Arc::new(CountingRepo::default()));
        let request = route_request(IncomingRequest::get("/nowhere/about"));
        assert!(resolver.current(&request).await.expect("resolves").is_site());
    }
}
