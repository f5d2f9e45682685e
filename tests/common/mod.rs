#![allow(dead_code)]

use std::{
    collections::BTreeMap, net::SocketAddr, num::NonZeroU32, path::Path, sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, header},
    response::Response,
};
use folio::{
    application::{builtin, messages::StaticCatalog},
    config::{
        CacheSettings, LogFormat, LoggingSettings, RoutingSettings, ServerSettings, Settings,
        SiteSettings,
    },
    domain::{identity::Role, tenant::Tenant},
    infra::{
        http::{HttpState, build_router},
        tenants::ConfigTenantRepo,
    },
    routing::{
        ApiRoute, Args, Dispatcher, Handler, HandlerError, HandlerOutput, HandlerRegistry,
        JsonMessage, RoleAssignments, RouteRequest, RoutingEnv,
    },
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use tracing::level_filters::LevelFilter;
use uuid::Uuid;

pub fn tenant(path: &str, enabled: bool, locales: &[&str]) -> Tenant {
    Tenant {
        id: Uuid::new_v4(),
        path: path.to_string(),
        name: format!("{path} journal"),
        enabled,
        primary_locale: locales[0].to_string(),
        supported_locales: locales.iter().map(|locale| locale.to_string()).collect(),
    }
}

/// `demo` (en, fr_CA), `mono` (en) and the disabled `closed` (en).
pub fn settings() -> Settings {
    Settings {
        server: ServerSettings {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            max_body_bytes: 1024,
            graceful_shutdown: Duration::from_secs(1),
        },
        logging: LoggingSettings {
            level: LevelFilter::WARN,
            format: LogFormat::Compact,
        },
        routing: RoutingSettings {
            base_url: Some("http://localhost".to_string()),
            base_url_overrides: BTreeMap::new(),
            ..RoutingSettings::default()
        },
        site: SiteSettings::default(),
        cache: CacheSettings::default(),
        tenants: vec![
            tenant("demo", true, &["en", "fr_CA"]),
            tenant("mono", true, &["en"]),
            tenant("closed", false, &["en"]),
        ],
    }
}

pub fn with_cache(mut settings: Settings, directory: &Path, pages: &[&str]) -> Settings {
    settings.cache = CacheSettings {
        enabled: true,
        ttl_hours: NonZeroU32::MIN,
        directory: directory.to_path_buf(),
        cacheable_pages: pages.iter().map(|page| page.to_string()).collect(),
    };
    settings
}

/// Page `workflow`; its `access` operation requires an editor.
pub struct WorkflowPage;

#[async_trait]
impl Handler for WorkflowPage {
    fn operations(&self) -> &[&'static str] {
        &["index", "show", "access"]
    }

    fn role_assignments(&self) -> RoleAssignments {
        RoleAssignments::new().allow(&[Role::Editor], &["access"])
    }

    async fn invoke(
        &self,
        op: &str,
        request: &RouteRequest,
        args: &Args,
    ) -> Result<HandlerOutput, HandlerError> {
        match op {
            "show" => {
                let id = args.first().ok_or(HandlerError::NotFound)?;
                Ok(HandlerOutput::Text(format!(
                    "submission {id} in {}",
                    request.locale().unwrap_or("?")
                )))
            }
            _ => Ok(HandlerOutput::Text(format!("workflow {op}"))),
        }
    }
}

/// API entity `submissions`: list, fetch and delete.
pub struct SubmissionsApi;

#[async_trait]
impl Handler for SubmissionsApi {
    fn operations(&self) -> &[&'static str] {
        &["list", "get", "delete"]
    }

    fn api_routes(&self) -> Vec<ApiRoute> {
        vec![
            ApiRoute::new(Method::GET, "", "list"),
            ApiRoute::new(Method::GET, "/{submissionId}", "get"),
            ApiRoute::new(Method::DELETE, "/{submissionId}", "delete").roles(&[Role::Manager]),
        ]
    }

    async fn invoke(
        &self,
        op: &str,
        _request: &RouteRequest,
        args: &Args,
    ) -> Result<HandlerOutput, HandlerError> {
        let content = match op {
            "get" => json!({ "id": args.get("submissionId") }),
            _ => json!({ "op": op }),
        };
        Ok(HandlerOutput::Json(JsonMessage::ok(content)))
    }
}

/// Component `grid.users.UserGridHandler` with `fetchGrid`.
pub struct UserGrid;

#[async_trait]
impl Handler for UserGrid {
    fn operations(&self) -> &[&'static str] {
        &["fetchGrid"]
    }

    async fn invoke(
        &self,
        _op: &str,
        _request: &RouteRequest,
        args: &Args,
    ) -> Result<HandlerOutput, HandlerError> {
        Ok(HandlerOutput::Json(JsonMessage::ok(
            json!({ "rows": args.get("rows") }),
        )))
    }
}

pub fn registry(settings: &Settings, messages: Arc<StaticCatalog>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    builtin::register(
        &mut registry,
        &settings.routing.default_page,
        &settings.site.title,
        messages,
    );
    registry.register_page("workflow", || Arc::new(WorkflowPage));
    registry.register_api("v1", "submissions", || Arc::new(SubmissionsApi));
    registry.register_plugin_api(("generic", "reports"), "v1", "submissions", || {
        Arc::new(SubmissionsApi)
    });
    registry.register_component("grid.users.UserGridHandler", || Arc::new(UserGrid));
    registry
}

pub fn dispatcher(settings: &Settings) -> Arc<Dispatcher> {
    let messages = Arc::new(StaticCatalog::with_router_messages());
    let env = RoutingEnv::new(
        settings.routing.clone(),
        settings.site.clone(),
        registry(settings, messages.clone()),
        Arc::new(ConfigTenantRepo::new(settings.tenants.clone())),
        messages,
    );
    Arc::new(Dispatcher::standard(Arc::new(env), settings))
}

pub fn app_with(dispatcher: Arc<Dispatcher>, max_body_bytes: usize) -> Router {
    build_router(HttpState {
        dispatcher,
        max_body_bytes,
    })
}

pub fn app(settings: &Settings) -> Router {
    app_with(dispatcher(settings), settings.server.max_body_bytes)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone()
        .oneshot(request)
        .await
        .expect("router is infallible")
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(
        app,
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    )
    .await
}

pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).expect("json body")
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}
