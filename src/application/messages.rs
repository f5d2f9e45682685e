//! Localized user-facing messages.
//!
//! Locale resource loading lives outside this crate; the router only needs to turn a
//! stable message key (plus parameters) into text for a locale.

use std::collections::HashMap;

/// Translates message keys for a locale. Unknown keys translate to themselves.
pub trait MessageCatalog: Send + Sync {
    fn translate(&self, locale: &str, key: &str, params: &[(String, String)]) -> String;
}

/// In-memory catalog with `{$name}` parameter substitution.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<(String, String), String>,
    fallback_locale: Option<String>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with the English messages the router itself emits.
    pub fn with_router_messages() -> Self {
        let mut catalog = Self::new().fallback("en");
        for (key, text) in ROUTER_MESSAGES_EN {
            catalog.insert("en", key, text);
        }
        catalog
    }

    pub fn fallback(mut self, locale: impl Into<String>) -> Self {
        self.fallback_locale = Some(locale.into());
        self
    }

    pub fn insert(&mut self, locale: &str, key: &str, text: &str) {
        self.entries
            .insert((locale.to_string(), key.to_string()), text.to_string());
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
        self.entries
            .get(&(locale.to_string(), key.to_string()))
            .or_else(|| {
                self.fallback_locale
                    .as_ref()
                    .and_then(|fallback| self.entries.get(&(fallback.clone(), key.to_string())))
            })
            .map(String::as_str)
    }
}

impl MessageCatalog for StaticCatalog {
    fn translate(&self, locale: &str, key: &str, params: &[(String, String)]) -> String {
        let Some(template) = self.lookup(locale, key) else {
            return key.to_string();
        };
        let mut text = template.to_string();
        for (name, value) in params {
            text = text.replace(&format!("{{${name}}}"), value);
        }
        text
    }
}

const ROUTER_MESSAGES_EN: &[(&str, &str)] = &[
    (
        "api.404.endpointNotFound",
        "The endpoint you requested could not be found.",
    ),
    (
        "api.404.contextNotFound",
        "The journal or press you requested could not be found.",
    ),
    (
        "api.405.methodNotAllowed",
        "The requested method is not supported by this endpoint.",
    ),
    (
        "api.403.unauthorized",
        "You are not allowed to access the requested resource.",
    ),
    (
        "user.authorization.accessDenied",
        "You are not authorized to access the requested resource.",
    ),
    (
        "user.authorization.roleBasedAccessDenied",
        "Access denied: you do not hold a role permitted to perform {$operation}.",
    ),
    (
        "user.authorization.loginRequired",
        "Please log in to continue.",
    ),
    (
        "component.404.notFound",
        "The requested component could not be found.",
    ),
];
