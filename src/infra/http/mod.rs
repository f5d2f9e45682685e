//! HTTP adapter: every request is handed to the dispatcher through a single fallback.

mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Response},
};

use crate::{
    application::error::HttpError,
    domain::identity::Session,
    routing::{Dispatcher, IncomingRequest},
};

pub use middleware::{RequestContext, RouteTrace};

const SOURCE: &str = "infra::http::dispatch_request";

#[derive(Clone)]
pub struct HttpState {
    pub dispatcher: Arc<Dispatcher>,
    pub max_body_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .fallback(dispatch_request)
        .with_state(state)
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
}

/// Buffer the body, parse the URL and let the dispatcher pick a strategy.
///
/// A [`Session`] placed in the request extensions by an outer layer is passed through.
async fn dispatch_request(State(state): State<HttpState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(err) => {
            return HttpError::from_error(
                SOURCE,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
                &err,
            )
            .into_response();
        }
    };
    let session = parts.extensions.get::<Session>().cloned();

    let request = state
        .dispatcher
        .prepare(IncomingRequest::from_parts(&parts, body, session));
    let mut response = match state.dispatcher.dispatch(&request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };
    let endpoint = request.endpoint();
    response.extensions_mut().insert(RouteTrace {
        router: request.router_name().map(str::to_string),
        context: request.parsed().context().to_string(),
        handler: endpoint.map(|endpoint| endpoint.handler.clone()),
        op: endpoint.map(|endpoint| endpoint.op.clone()),
    });
    response
}
