//! URL parsing for both deployment modes.
//!
//! Path-info mode reads `/<context>/<locale>/<page>/<op>/<args...>` from the request
//! path. Query-string mode reads the same fields from `context`, `locale`, `page`,
//! `op` and repeated `path[]` parameters (or `endpoint` / `component` for the API and
//! RPC shapes) and synthesizes the equivalent segment list, so strategies see one
//! representation regardless of mode.

use crate::domain::url::{INDEX_OP, ParsedUrl, canonical_context, sanitize_segment};

use super::component::COMPONENT_MARKER;

pub const CONTEXT_PARAM: &str = "context";
pub const LOCALE_PARAM: &str = "locale";
pub const PAGE_PARAM: &str = "page";
pub const OP_PARAM: &str = "op";
pub const PATH_PARAM: &str = "path[]";
pub const ENDPOINT_PARAM: &str = "endpoint";
pub const COMPONENT_PARAM: &str = "component";

const ROUTING_PARAMS: &[&str] = &[
    CONTEXT_PARAM,
    LOCALE_PARAM,
    PAGE_PARAM,
    OP_PARAM,
    PATH_PARAM,
    "path",
    ENDPOINT_PARAM,
    COMPONENT_PARAM,
];

/// Inputs shared by both parsers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub context_depth: usize,
    pub script_name: String,
    /// Locale codes recognised as a locale segment.
    pub known_locales: Vec<String>,
    /// Context implied by the request host through a base URL override.
    pub implied_context: Option<String>,
}

pub trait UrlParser: Send + Sync {
    fn mode(&self) -> &'static str;

    fn parse(&self, path: &str, query: &[(String, String)], options: &ParseOptions) -> ParsedUrl;
}

/// Parser used for the whole process lifetime, chosen once from configuration.
pub fn parser_for(path_info: bool) -> Box<dyn UrlParser> {
    if path_info {
        Box::new(PathInfoParser)
    } else {
        Box::new(QueryStringParser)
    }
}

/// Strip the script segment from `path`; `None` when nothing remains.
pub fn path_info(path: &str, script_name: &str) -> Option<String> {
    let trimmed = path.trim_start_matches('/');
    let rest = match trimmed.split_once('/') {
        Some((first, rest)) if first == script_name => rest,
        None if trimmed == script_name => "",
        _ => trimmed,
    };
    if rest.trim_matches('/').is_empty() {
        None
    } else {
        Some(format!("/{rest}"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathInfoParser;

impl UrlParser for PathInfoParser {
    fn mode(&self) -> &'static str {
        "path_info"
    }

    fn parse(&self, path: &str, query: &[(String, String)], options: &ParseOptions) -> ParsedUrl {
        let segments = path_info(path, &options.script_name)
            .map(|info| {
                info.trim_matches('/')
                    .split('/')
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        interpret(segments, query.to_vec(), options)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryStringParser;

impl UrlParser for QueryStringParser {
    fn mode(&self) -> &'static str {
        "query_string"
    }

    fn parse(&self, _path: &str, query: &[(String, String)], options: &ParseOptions) -> ParsedUrl {
        let param = |name: &str| {
            query
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };

        let mut segments = Vec::new();
        if options.implied_context.is_none() {
            for level in 0..options.context_depth {
                let value = if level == 0 { param(CONTEXT_PARAM) } else { None };
                segments.push(value.unwrap_or_default().to_string());
            }
        }

        if let Some(component) = param(COMPONENT_PARAM) {
            segments.push(COMPONENT_MARKER.to_string());
            segments.extend(component.split('.').map(str::to_string));
            segments.push(param(OP_PARAM).unwrap_or_default().to_string());
        } else if let Some(endpoint) = param(ENDPOINT_PARAM) {
            segments.extend(
                endpoint
                    .trim_matches('/')
                    .split('/')
                    .filter(|part| !part.is_empty())
                    .map(str::to_string),
            );
        } else {
            let known = |locale: &&str| options.known_locales.iter().any(|l| l == locale);
            if let Some(locale) = param(LOCALE_PARAM).filter(known) {
                segments.push(locale.to_string());
            }
            let page = param(PAGE_PARAM);
            let op = param(OP_PARAM);
            let args: Vec<&str> = query
                .iter()
                .filter(|(key, _)| key == PATH_PARAM || key == "path")
                .map(|(_, value)| value.as_str())
                .collect();
            if page.is_some() || op.is_some() || !args.is_empty() {
                segments.push(page.unwrap_or_default().to_string());
            }
            if op.is_some() || !args.is_empty() {
                segments.push(op.unwrap_or(INDEX_OP).to_string());
            }
            segments.extend(args.into_iter().map(str::to_string));
        }

        let residual = query
            .iter()
            .filter(|(key, _)| !ROUTING_PARAMS.contains(&key.as_str()))
            .cloned()
            .collect();
        interpret(segments, residual, options)
    }
}

/// Read the page-style fields out of a logical segment list.
fn interpret(
    segments: Vec<String>,
    query: Vec<(String, String)>,
    options: &ParseOptions,
) -> ParsedUrl {
    let (contexts, rest_start) = match options.implied_context.as_ref() {
        Some(context) => (vec![canonical_context(Some(context))], 0),
        None => {
            let contexts = (0..options.context_depth)
                .map(|level| canonical_context(segments.get(level).map(String::as_str)))
                .collect();
            (contexts, options.context_depth.min(segments.len()))
        }
    };

    let mut rest = segments[rest_start..].iter().map(|segment| sanitize_segment(segment));
    let mut first = rest.next();

    let locale = match first.as_ref() {
        Some(candidate) if options.known_locales.contains(candidate) => {
            let locale = first.take();
            first = rest.next();
            locale
        }
        _ => None,
    };

    let page = first.filter(|page| !page.is_empty());
    let op = rest
        .next()
        .filter(|op| !op.is_empty())
        .unwrap_or_else(|| INDEX_OP.to_string());
    let args = rest.collect();

    ParsedUrl::new(
        segments,
        options.context_depth,
        contexts,
        options.implied_context.is_some(),
        locale,
        page,
        op,
        args,
        query,
    )
}
