use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{application::error::ErrorReport, domain::identity::Session};

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Routing outcome attached to the response by the dispatch handler.
#[derive(Debug, Clone, Default)]
pub struct RouteTrace {
    pub router: Option<String>,
    pub context: String,
    pub handler: Option<String>,
    pub op: Option<String>,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let user = request
        .extensions()
        .get::<Session>()
        .and_then(|session| session.principal.as_ref())
        .map(|principal| principal.username.clone())
        .unwrap_or_default();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let trace = response
        .extensions_mut()
        .remove::<RouteTrace>()
        .unwrap_or_default();
    let router = trace.router.as_deref().unwrap_or("none");
    let handler = trace.handler.as_deref().unwrap_or("");
    let op = trace.op.as_deref().unwrap_or("");

    if !status.is_client_error() && !status.is_server_error() {
        debug!(
            target = "folio::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms = elapsed_ms,
            router = router,
            context = %trace.context,
            handler = handler,
            op = op,
            request_id = request_id,
            "request served",
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, messages) = match report {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        error!(
            target = "folio::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            elapsed_ms = elapsed_ms,
            router = router,
            context = %trace.context,
            handler = handler,
            op = op,
            source = source,
            detail = %detail,
            chain = ?messages,
            request_id = request_id,
            user = %user,
            "request failed",
        );
    } else {
        warn!(
            target = "folio::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms = elapsed_ms,
            router = router,
            context = %trace.context,
            source = source,
            detail = %detail,
            request_id = request_id,
            user = %user,
            "client request error",
        );
    }

    response
}
