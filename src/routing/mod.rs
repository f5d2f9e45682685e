//! Request routing: URL parsing, strategy selection, handler invocation and URL
//! generation.

pub mod api;
pub mod component;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod handler;
pub mod link;
pub mod page;
pub mod parser;
mod pipeline;
pub mod registry;
pub mod request;
pub mod strategy;
pub mod tenant;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{API_ROUTER, COMPONENT_ROUTER, Dispatcher, DispatcherBuilder, PAGE_ROUTER};
pub use env::RoutingEnv;
pub use error::{RoutingError, UrlError};
pub use handler::{
    ApiRoute, Args, AuthorizationFailure, Handler, HandlerError, HandlerOutput, JsonMessage,
    RoleAssignments, ServiceEndpoint,
};
pub use link::{UrlSpec, local_redirect};
pub use page::LocaleChange;
pub use registry::{HandlerRegistry, Interceptor, StrategyKind};
pub use request::{IncomingRequest, RouteRequest};
pub use strategy::{Resolution, RouterStrategy};
