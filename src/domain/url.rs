//! Parsed request URL value shared by every routing strategy.

/// Context path naming the site itself rather than a tenant.
pub const SITE_CONTEXT: &str = "index";

/// Operation used when a request names none.
pub const INDEX_OP: &str = "index";

/// Strip every character outside `[A-Za-z0-9_-]`.
pub fn sanitize_segment(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Sanitize a context segment, canonicalizing empty input to [`SITE_CONTEXT`].
pub fn canonical_context(raw: Option<&str>) -> String {
    let sanitized = raw.map(sanitize_segment).unwrap_or_default();
    if sanitized.is_empty() {
        SITE_CONTEXT.to_string()
    } else {
        sanitized
    }
}

/// Immutable description of an inbound request path, derived once per request.
///
/// `segments` holds the raw logical segments (context segments included, script
/// segment excluded); the remaining fields are the sanitized page-style reading of
/// those segments. API and RPC strategies work on the raw segments directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    segments: Vec<String>,
    context_depth: usize,
    contexts: Vec<String>,
    context_from_host: bool,
    locale: Option<String>,
    page: Option<String>,
    op: String,
    args: Vec<String>,
    query: Vec<(String, String)>,
}

impl ParsedUrl {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        segments: Vec<String>,
        context_depth: usize,
        contexts: Vec<String>,
        context_from_host: bool,
        locale: Option<String>,
        page: Option<String>,
        op: String,
        args: Vec<String>,
        query: Vec<(String, String)>,
    ) -> Self {
        Self {
            segments,
            context_depth,
            contexts,
            context_from_host,
            locale,
            page,
            op,
            args,
            query,
        }
    }

    /// All logical path segments, unsanitized.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments following the reserved context segments.
    pub fn rest_segments(&self) -> &[String] {
        let skip = if self.context_from_host {
            0
        } else {
            self.context_depth.min(self.segments.len())
        };
        &self.segments[skip..]
    }

    /// The canonical tenant context path; [`SITE_CONTEXT`] when absent.
    pub fn context(&self) -> &str {
        self.contexts
            .first()
            .map(String::as_str)
            .unwrap_or(SITE_CONTEXT)
    }

    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }

    /// True when the context came from a base URL override rather than a path segment.
    pub fn context_from_host(&self) -> bool {
        self.context_from_host
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Explicit page identifier; `None` means "use the default handler".
    pub fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    pub fn op(&self) -> &str {
        &self.op
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Residual query parameters, with any routing parameters removed.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_query(&self) -> bool {
        !self.query.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_injection() {
        assert_eq!(sanitize_segment("../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_segment("fr_CA"), "fr_CA");
        assert_eq!(sanitize_segment("user-grid"), "user-grid");
        assert_eq!(sanitize_segment("a.b%20c"), "ab20c");
    }

    #[test]
    fn empty_context_canonicalizes_to_site() {
        assert_eq!(canonical_context(None), SITE_CONTEXT);
        assert_eq!(canonical_context(Some("")), SITE_CONTEXT);
        assert_eq!(canonical_context(Some("..")), SITE_CONTEXT);
        assert_eq!(canonical_context(Some("demo")), "demo");
    }
}
