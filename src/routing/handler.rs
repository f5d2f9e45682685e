//! Handler contract shared by every strategy's invocation pipeline.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use axum::{http::Method, response::Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::identity::Role;

use super::request::RouteRequest;

/// Arguments handed to a handler operation.
///
/// Page requests carry positional path arguments; API requests carry matched path
/// parameters both positionally and by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    positional: Vec<String>,
    named: Vec<(String, String)>,
}

impl Args {
    pub fn positional(values: Vec<String>) -> Self {
        Self {
            positional: values,
            named: Vec::new(),
        }
    }

    pub fn named(pairs: Vec<(String, String)>) -> Self {
        Self {
            positional: pairs.iter().map(|(_, value)| value.clone()).collect(),
            named: pairs,
        }
    }

    pub fn values(&self) -> &[String] {
        &self.positional
    }

    pub fn first(&self) -> Option<&str> {
        self.positional.first().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.named
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Roles permitted per operation, as declared by a handler.
#[derive(Debug, Clone, Default)]
pub struct RoleAssignments {
    by_op: HashMap<String, Vec<Role>>,
}

impl RoleAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, roles: &[Role], ops: &[&str]) -> Self {
        for op in ops {
            self.by_op
                .entry((*op).to_string())
                .or_default()
                .extend_from_slice(roles);
        }
        self
    }

    /// Roles for `op`; empty means the operation is open to everyone.
    pub fn for_op(&self, op: &str) -> &[Role] {
        self.by_op.get(op).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Why a handler refused a request. Carries a message key, never prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationFailure {
    pub message_key: String,
    pub params: Vec<(String, String)>,
}

impl AuthorizationFailure {
    pub const ACCESS_DENIED: &'static str = "user.authorization.accessDenied";
    pub const LOGIN_REQUIRED: &'static str = "user.authorization.loginRequired";

    pub fn new(message_key: impl Into<String>) -> Self {
        Self {
            message_key: message_key.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

impl fmt::Display for AuthorizationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "authorization failed: {}", self.message_key)
    }
}

/// JSON envelope returned by RPC-style operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonMessage {
    pub status: bool,
    pub content: Value,
    #[serde(rename = "elementId", skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
}

impl JsonMessage {
    pub fn ok(content: impl Into<Value>) -> Self {
        Self {
            status: true,
            content: content.into(),
            element_id: None,
            event: None,
        }
    }

    pub fn failed(content: impl Into<Value>) -> Self {
        Self {
            status: false,
            ..Self::ok(content)
        }
    }
}

/// What an operation produced.
pub enum HandlerOutput {
    /// Echoed verbatim as an HTML body.
    Text(String),
    /// Serialized with a JSON content type.
    Json(JsonMessage),
    /// A fully-formed response (redirects, downloads).
    Response(Response),
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("requested resource not found")]
    NotFound,
    #[error("handler failed: {0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// One REST route exposed by an API entity module.
#[derive(Debug, Clone)]
pub struct ApiRoute {
    pub method: Method,
    /// Pattern relative to the entity, e.g. `""` or `"/{id}"`.
    pub pattern: String,
    pub op: String,
    pub roles: Vec<Role>,
}

impl ApiRoute {
    pub fn new(method: Method, pattern: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            op: op.into(),
            roles: Vec::new(),
        }
    }

    pub fn roles(mut self, roles: &[Role]) -> Self {
        self.roles = roles.to_vec();
        self
    }
}

/// A resolved request handler: a page module, an API entity module, or an RPC component.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Names of the operations this handler exposes.
    fn operations(&self) -> &[&'static str];

    fn has_operation(&self, op: &str) -> bool {
        self.operations().contains(&op)
    }

    fn role_assignments(&self) -> RoleAssignments {
        RoleAssignments::default()
    }

    /// REST routes, for handlers registered with the API strategy.
    fn api_routes(&self) -> Vec<ApiRoute> {
        Vec::new()
    }

    async fn authorize(
        &self,
        request: &RouteRequest,
        _args: &Args,
        roles: &[Role],
    ) -> Result<(), AuthorizationFailure> {
        require_roles(request, roles)
    }

    async fn validate(
        &self,
        _request: &RouteRequest,
        _args: &Args,
    ) -> Result<(), AuthorizationFailure> {
        Ok(())
    }

    async fn initialize(&self, _request: &RouteRequest, _args: &Args) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn invoke(
        &self,
        op: &str,
        request: &RouteRequest,
        args: &Args,
    ) -> Result<HandlerOutput, HandlerError>;
}

/// Default role check: open when `roles` is empty, otherwise the caller must hold one
/// of them in the request's context.
pub fn require_roles(request: &RouteRequest, roles: &[Role]) -> Result<(), AuthorizationFailure> {
    if roles.is_empty() {
        return Ok(());
    }
    match request.principal() {
        None => Err(AuthorizationFailure::new(
            AuthorizationFailure::LOGIN_REQUIRED,
        )),
        Some(principal) if principal.has_any_role(request.parsed().context(), roles) => Ok(()),
        Some(_) => Err(AuthorizationFailure::new(
            AuthorizationFailure::ACCESS_DENIED,
        )),
    }
}

/// The tuple a strategy resolves a request to.
pub struct HandlerInvocation {
    pub handler: Arc<dyn Handler>,
    pub handler_id: String,
    pub op: String,
    pub args: Args,
    pub roles: Vec<Role>,
}

impl HandlerInvocation {
    pub fn endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint {
            handler: self.handler_id.clone(),
            op: self.op.clone(),
        }
    }
}

/// The (handler, operation) pair a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub handler: String,
    pub op: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_args_are_also_positional() {
        let args = Args::named(vec![
            ("submissionId".to_string(), "12".to_string()),
            ("fileId".to_string(), "3".to_string()),
        ]);
        assert_eq!(args.values(), ["12", "3"]);
        assert_eq!(args.get("fileId"), Some("3"));
        assert_eq!(args.first(), Some("12"));
    }

    #[test]
    fn role_assignments_default_to_open() {
        let roles = RoleAssignments::new().allow(&[Role::Editor], &["assign"]);
        assert_eq!(roles.for_op("assign"), [Role::Editor]);
        assert!(roles.for_op("show").is_empty());
    }

    #[test]
    fn json_message_serializes_envelope_fields() {
        let message = JsonMessage::ok("<div/>");
        let encoded = serde_json::to_value(&message).expect("serializable");
        assert_eq!(encoded["status"], true);
        assert_eq!(encoded["content"], "<div/>");
        assert!(encoded.get("event").is_none());
    }
}
