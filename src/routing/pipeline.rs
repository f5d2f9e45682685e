//! Handler invocation pipeline: operation check, authorize, validate, initialize, execute.

use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::application::error::HttpError;

use super::{
    handler::{HandlerError, HandlerInvocation, HandlerOutput},
    request::RouteRequest,
    strategy::RouterStrategy,
};

const SOURCE: &str = "routing::pipeline";

pub(crate) async fn run<S>(
    strategy: &S,
    request: &RouteRequest,
    invocation: HandlerInvocation,
) -> Response
where
    S: RouterStrategy + ?Sized,
{
    let HandlerInvocation {
        handler,
        handler_id,
        op,
        args,
        roles,
    } = invocation;

    if !handler.has_operation(&op) {
        return strategy.not_found(
            request,
            &format!("handler `{handler_id}` has no operation `{op}`"),
        );
    }

    if let Err(failure) = handler.authorize(request, &args, &roles).await {
        debug!(
            target = SOURCE,
            handler = %handler_id,
            op = %op,
            message_key = %failure.message_key,
            result = "unauthorized",
            "Authorization refused"
        );
        return strategy.handle_authorization_failure(request, &failure).await;
    }

    if strategy.validates() {
        if let Err(failure) = handler.validate(request, &args).await {
            return strategy.handle_authorization_failure(request, &failure).await;
        }
    }

    if let Err(err) = handler.initialize(request, &args).await {
        return handler_error(strategy, request, &handler_id, &op, err);
    }

    match handler.invoke(&op, request, &args).await {
        Ok(HandlerOutput::Text(body)) => Html(body).into_response(),
        Ok(HandlerOutput::Json(message)) => Json(message).into_response(),
        Ok(HandlerOutput::Response(response)) => response,
        Err(err) => handler_error(strategy, request, &handler_id, &op, err),
    }
}

fn handler_error<S>(
    strategy: &S,
    request: &RouteRequest,
    handler_id: &str,
    op: &str,
    err: HandlerError,
) -> Response
where
    S: RouterStrategy + ?Sized,
{
    match err {
        HandlerError::NotFound => {
            strategy.not_found(request, &format!("`{handler_id}::{op}` reported not found"))
        }
        HandlerError::Failed(_) => {
            warn!(
                target = SOURCE,
                handler = %handler_id,
                op = %op,
                error = %err,
                result = "error",
                "Handler failed"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unexpected error occurred",
                &err,
            )
            .into_response()
        }
    }
}
