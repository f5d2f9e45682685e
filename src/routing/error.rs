//! Routing errors and the error response shapes shared by the strategies.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::application::{
    error::{ErrorReport, HttpError},
    repos::RepoError,
};

const SOURCE: &str = "routing::error";
const NOT_FOUND_BODY: &str = "404 Not Found";

#[derive(Debug, Error)]
pub enum RoutingError {
    /// No registered strategy accepted the request. The catch-all page strategy makes
    /// this a deployment error.
    #[error("no router strategy supports request path `{path}`")]
    NoStrategy { path: String },
    #[error("tenant lookup failed: {0}")]
    Tenant(#[from] RepoError),
}

impl IntoResponse for RoutingError {
    fn into_response(self) -> Response {
        let (status, public_message) = match &self {
            RoutingError::NoStrategy { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Request could not be routed")
            }
            RoutingError::Tenant(RepoError::Timeout) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable")
            }
            RoutingError::Tenant(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error occurred")
            }
        };
        HttpError::from_error(SOURCE, status, public_message, &self).into_response()
    }
}

/// Failures while building a URL. These signal a programming error in the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("{strategy} URLs do not accept a `{field}` override")]
    UnsupportedOverride {
        strategy: &'static str,
        field: &'static str,
    },
    #[error("{strategy} URLs require a single context path, got {levels} levels")]
    ContextLevels {
        strategy: &'static str,
        levels: usize,
    },
    #[error("{strategy} URLs need an endpoint and the current request has none")]
    MissingEndpoint { strategy: &'static str },
    #[error("invalid component endpoint `{0}`")]
    InvalidComponent(String),
    #[error("router `{0}` is not registered")]
    UnknownRouter(String),
    #[error("no router is bound to the current request")]
    Unbound,
    #[error("invalid base URL `{base}`: {reason}")]
    InvalidBase { base: String, reason: String },
    #[error("tenant lookup failed: {0}")]
    Tenant(String),
}

/// Plain-text 404 used by page-style strategies.
pub fn not_found(detail: impl Into<String>) -> Response {
    HttpError::new(SOURCE, StatusCode::NOT_FOUND, NOT_FOUND_BODY, detail).into_response()
}

/// 500 for a URL the router itself failed to build.
pub(crate) fn url_failure(err: &UrlError) -> Response {
    HttpError::from_error(
        SOURCE,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Unexpected error occurred",
        err,
    )
    .into_response()
}

/// `302 Found` pointing at `location`.
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = StatusCode::FOUND.into_response();
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unexpected error occurred",
            &err,
        )
        .into_response(),
    }
}

/// JSON error body: a stable message key plus its translation.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

/// A JSON error response with the diagnostic report attached.
pub fn json_error(status: StatusCode, key: &str, message: String) -> Response {
    let report = ErrorReport::from_message(SOURCE, status, key);
    let mut response = (
        status,
        Json(ErrorEnvelope {
            error: key.to_string(),
            error_message: message,
        }),
    )
        .into_response();
    report.attach(&mut response);
    response
}
