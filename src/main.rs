use std::{future::IntoFuture, process, sync::Arc};

use axum::http::{Method, header};
use folio::{
    application::{builtin, error::AppError, messages::StaticCatalog, repos::TenantRepo},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        tenants::ConfigTenantRepo,
    },
    routing::{
        Dispatcher, HandlerRegistry, IncomingRequest, Resolution, RouterStrategy, RoutingEnv,
        RoutingError,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Resolve(args) => run_resolve(settings, args).await,
    }
}

fn build_dispatcher(settings: &config::Settings) -> Dispatcher {
    let messages = Arc::new(StaticCatalog::with_router_messages());
    let tenants: Arc<dyn TenantRepo> = Arc::new(ConfigTenantRepo::new(settings.tenants.clone()));

    let mut registry = HandlerRegistry::new();
    builtin::register(
        &mut registry,
        &settings.routing.default_page,
        &settings.site.title,
        messages.clone(),
    );

    let env = RoutingEnv::new(
        settings.routing.clone(),
        settings.site.clone(),
        registry,
        tenants,
        messages,
    );
    Dispatcher::standard(Arc::new(env), settings)
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let dispatcher = Arc::new(build_dispatcher(&settings));
    info!(
        target = "folio::serve",
        addr = %settings.server.addr,
        mode = dispatcher.parser_mode(),
        routers = ?dispatcher.router_names(),
        tenants = settings.tenants.len(),
        cache = settings.cache.enabled,
        "Starting HTTP service"
    );

    let router = http::build_router(HttpState {
        dispatcher,
        max_body_bytes: settings.server.max_body_bytes,
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| InfraError::bind(settings.server.addr, err))?;

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown({
            let stop = Arc::clone(&stop);
            async move { stop.notified().await }
        })
        .into_future();
    let mut server = std::pin::pin!(server);

    tokio::select! {
        result = &mut server => result.map_err(InfraError::Serve)?,
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(InfraError::Signal)?;
            info!(
                target = "folio::serve",
                grace_seconds = settings.server.graceful_shutdown.as_secs(),
                "Shutdown requested, draining connections"
            );
            stop.notify_one();
            match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
                Ok(result) => result.map_err(InfraError::Serve)?,
                Err(_) => warn!(
                    target = "folio::serve",
                    "Graceful shutdown timed out; dropping open connections"
                ),
            }
        }
    }

    info!(target = "folio::serve", "HTTP service stopped");
    Ok(())
}

async fn run_resolve(
    settings: config::Settings,
    args: config::ResolveArgs,
) -> Result<(), AppError> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .map_err(|err| AppError::validation(format!("invalid method `{}`: {err}", args.method)))?;

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for pair in &args.query {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| AppError::validation(format!("query `{pair}` is not KEY=VALUE")))?;
        query.append_pair(key, value);
    }
    let query = query.finish();
    let path_and_query = if query.is_empty() {
        args.path.clone()
    } else {
        format!("{}?{query}", args.path)
    };

    let dispatcher = build_dispatcher(&settings);
    let request = dispatcher.prepare(IncomingRequest::get(&path_and_query).with_method(method));
    let (name, resolution) = dispatcher.inspect(&request).await?;

    let tenant = dispatcher
        .env()
        .tenants
        .current(&request)
        .await
        .map_err(RoutingError::from)?;
    let locale = match dispatcher.router(name) {
        Some(router) => router.active_locale(&request).await,
        None => String::new(),
    };

    println!("mode:     {}", dispatcher.parser_mode());
    println!("strategy: {name}");
    println!("context:  {}", tenant.path());
    println!("locale:   {locale}");
    match resolution {
        Resolution::Invoke(invocation) => {
            println!("handler:  {}", invocation.handler_id);
            println!("op:       {}", invocation.op);
            println!("args:     {:?}", invocation.args.values());
            let roles: Vec<&str> = invocation.roles.iter().map(|role| role.as_str()).collect();
            println!("roles:    {roles:?}");
        }
        Resolution::Respond(response) => {
            println!("response: {}", response.status());
            if let Some(location) = response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok())
            {
                println!("location: {location}");
            }
        }
    }
    Ok(())
}
