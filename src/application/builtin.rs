//! Pages the router itself depends on: the index, login, installer and user pages.
//!
//! Real deployments replace these with full handlers; the router only needs the
//! pages to exist so redirects have somewhere to land.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::url::INDEX_OP,
    routing::{
        Args, AuthorizationFailure, Handler, HandlerError, HandlerOutput, HandlerRegistry,
        RouteRequest, local_redirect,
        error::redirect,
        page::{AUTHORIZATION_DENIED_OP, INSTALL_PAGE, LOGIN_PAGE, SET_LOCALE_OP, USER_PAGE},
    },
};

use super::messages::MessageCatalog;

const SOURCE_PARAM: &str = "source";
const MESSAGE_PARAM: &str = "message";

/// Register the built-in pages under `default_page`, `login`, `install` and `user`.
pub fn register(
    registry: &mut HandlerRegistry,
    default_page: &str,
    site_title: &str,
    messages: Arc<dyn MessageCatalog>,
) {
    let title = site_title.to_string();
    registry.register_page(default_page, move || {
        Arc::new(IndexPage {
            site_title: title.clone(),
        })
    });
    registry.register_page(LOGIN_PAGE, || Arc::new(LoginPage));
    registry.register_page(INSTALL_PAGE, || Arc::new(InstallPage));
    registry.register_page(USER_PAGE, move || {
        Arc::new(UserPage {
            messages: Arc::clone(&messages),
        })
    });
}

struct IndexPage {
    site_title: String,
}

#[async_trait]
impl Handler for IndexPage {
    fn operations(&self) -> &[&'static str] {
        &[INDEX_OP]
    }

    async fn invoke(
        &self,
        _op: &str,
        request: &RouteRequest,
        _args: &Args,
    ) -> Result<HandlerOutput, HandlerError> {
        let title = request
            .tenant()
            .and_then(|context| context.tenant().map(|tenant| escape_html(&tenant.name)))
            .unwrap_or_else(|| escape_html(&self.site_title));
        Ok(HandlerOutput::Text(format!(
            "<!doctype html><title>{title}</title><h1>{title}</h1>"
        )))
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

struct LoginPage;

#[async_trait]
impl Handler for LoginPage {
    fn operations(&self) -> &[&'static str] {
        &[INDEX_OP]
    }

    async fn invoke(
        &self,
        _op: &str,
        _request: &RouteRequest,
        _args: &Args,
    ) -> Result<HandlerOutput, HandlerError> {
        Ok(HandlerOutput::Text(
            "<!doctype html><title>Login</title><form method=\"post\"></form>".to_string(),
        ))
    }
}

struct InstallPage;

#[async_trait]
impl Handler for InstallPage {
    fn operations(&self) -> &[&'static str] {
        &[INDEX_OP]
    }

    async fn invoke(
        &self,
        _op: &str,
        _request: &RouteRequest,
        _args: &Args,
    ) -> Result<HandlerOutput, HandlerError> {
        Ok(HandlerOutput::Text(
            "<!doctype html><title>Install</title>".to_string(),
        ))
    }
}

struct UserPage {
    messages: Arc<dyn MessageCatalog>,
}

#[async_trait]
impl Handler for UserPage {
    fn operations(&self) -> &[&'static str] {
        &[SET_LOCALE_OP, AUTHORIZATION_DENIED_OP]
    }

    async fn invoke(
        &self,
        op: &str,
        request: &RouteRequest,
        _args: &Args,
    ) -> Result<HandlerOutput, HandlerError> {
        let parsed = request.parsed();
        match op {
            // Reached only when the requested locale is unsupported; go back unchanged.
            SET_LOCALE_OP => {
                let target = parsed
                    .query_param(SOURCE_PARAM)
                    .and_then(|source| local_redirect(request.base_url(), source))
                    .unwrap_or_else(|| request.base_url().to_string());
                Ok(HandlerOutput::Response(redirect(&target)))
            }
            AUTHORIZATION_DENIED_OP => {
                let key = parsed
                    .query_param(MESSAGE_PARAM)
                    .filter(|key| key.chars().all(|c| c.is_ascii_alphanumeric() || c == '.'))
                    .unwrap_or(AuthorizationFailure::ACCESS_DENIED);
                let locale = request.locale().unwrap_or_default();
                let message = self.messages.translate(locale, key, &[]);
                Ok(HandlerOutput::Text(format!(
                    "<!doctype html><title>Access denied</title><p>{message}</p>"
                )))
            }
            _ => Err(HandlerError::NotFound),
        }
    }
}
