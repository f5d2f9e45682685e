//! URL generation shared by the routing strategies.

use url::Url;

use crate::config::RoutingSettings;

use super::{error::UrlError, parser::CONTEXT_PARAM, request::RouteRequest};

/// Context override for a generated URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextOverride {
    Path(String),
    /// One entry per context level.
    Levels(Vec<String>),
}

/// Overrides for a generated URL. Every unset field falls back to the current request
/// where the strategy allows it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlSpec {
    pub context: Option<ContextOverride>,
    pub locale: Option<String>,
    /// Page identifier, API endpoint path or component identifier.
    pub endpoint: Option<String>,
    pub op: Option<String>,
    pub path: Option<Vec<String>>,
    pub params: Vec<(String, String)>,
    pub anchor: Option<String>,
    /// Entity-escape `&` for embedding in HTML.
    pub escape: bool,
}

impl UrlSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(mut self, path: impl Into<String>) -> Self {
        self.context = Some(ContextOverride::Path(path.into()));
        self
    }

    pub fn context_levels<I, S>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context = Some(ContextOverride::Levels(
            levels.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn page(self, page: impl Into<String>) -> Self {
        self.endpoint(page)
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = Some(path.into_iter().map(Into::into).collect());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn escaped(mut self) -> Self {
        self.escape = true;
        self
    }
}

/// Strategy-neutral pieces of a URL, assembled per deployment mode by [`compose`].
#[derive(Debug, Clone, Default)]
pub(crate) struct LinkParts {
    pub context: String,
    /// Segments after the context, for path-info mode.
    pub segments: Vec<String>,
    /// The same information as named parameters, for query-string mode.
    pub routing_params: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub anchor: Option<String>,
    pub escape: bool,
}

/// Render `parts` as an absolute URL for the current deployment mode.
///
/// Tenants with a base URL override are addressed through that base and lose their
/// context segment; everything else hangs off the request's base URL.
pub(crate) fn compose(
    settings: &RoutingSettings,
    request: &RouteRequest,
    parts: LinkParts,
) -> Result<String, UrlError> {
    let (base, omit_context) = match settings.base_url_overrides.get(&parts.context) {
        Some(base) => (base.as_str(), true),
        None => (request.base_url(), false),
    };

    let mut url = Url::parse(base).map_err(|err| UrlError::InvalidBase {
        base: base.to_string(),
        reason: err.to_string(),
    })?;

    {
        let mut path = url.path_segments_mut().map_err(|()| UrlError::InvalidBase {
            base: base.to_string(),
            reason: "base URL cannot carry a path".to_string(),
        })?;
        path.pop_if_empty();
        if !settings.restful_urls {
            path.push(&settings.script_name);
        }
        if settings.path_info {
            if !omit_context {
                path.push(&parts.context);
            }
            path.extend(parts.segments.iter());
        }
    }

    let mut query = Vec::new();
    if !settings.path_info {
        if !omit_context {
            query.push((CONTEXT_PARAM.to_string(), parts.context.clone()));
        }
        query.extend(parts.routing_params);
    }
    query.extend(parts.params);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }

    if let Some(anchor) = parts.anchor.as_deref() {
        url.set_fragment(Some(anchor));
    }

    let rendered = url.to_string();
    if parts.escape {
        Ok(rendered.replace('&', "&amp;"))
    } else {
        Ok(rendered)
    }
}

/// Whether two URLs share scheme, host and port.
pub(crate) fn same_origin(left: &Url, right: &Url) -> bool {
    left.scheme() == right.scheme()
        && left.host_str() == right.host_str()
        && left.port_or_known_default() == right.port_or_known_default()
}

/// Resolve a site-relative `source` against `base_url`, refusing anything that would
/// leave the base URL's origin.
pub fn local_redirect(base_url: &str, source: &str) -> Option<String> {
    if !source.starts_with('/') || source.starts_with("//") || source.contains('\\') {
        return None;
    }
    let base = Url::parse(base_url).ok()?;
    let target = base.join(source).ok()?;
    same_origin(&base, &target).then(|| target.into())
}
