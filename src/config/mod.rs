//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::BTreeMap, net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::{
    tenant::{SiteLocales, Tenant},
    url::{SITE_CONTEXT, sanitize_segment},
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_BODY_BYTES: u64 = 1024 * 1024;
const DEFAULT_GRACEFUL_SHUTDOWN_SECONDS: u64 = 30;
const DEFAULT_SCRIPT_NAME: &str = "index.php";
const DEFAULT_PAGE: &str = "index";
const DEFAULT_API_VERSION: &str = "v1";
const DEFAULT_COMPONENT_MAX_DEPTH: usize = 9;
const MIN_COMPONENT_DEPTH: usize = 3;
const DEFAULT_SITE_TITLE: &str = "Folio";
const DEFAULT_LOCALE: &str = "en";
const DEFAULT_CACHE_TTL_HOURS: u32 = 1;
const DEFAULT_CACHE_DIR: &str = "cache";

/// Command-line arguments for the folio binary.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Folio editorial workflow router")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Show how a request path would be routed, without running any handler.
    Resolve(ResolveArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RoutingOverrides {
    /// Toggle path-info style URLs (false reads routing fields from the query string).
    #[arg(
        long = "routing-path-info",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub path_info: Option<bool>,

    /// Toggle RESTful URLs (omit the script segment from generated URLs).
    #[arg(
        long = "routing-restful-urls",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub restful_urls: Option<bool>,

    /// Override the base URL used for generated links.
    #[arg(long = "routing-base-url", value_name = "URL")]
    pub base_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub routing: RoutingOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the whole-page response cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the response cache directory.
    #[arg(long = "cache-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub cache_directory: Option<PathBuf>,

    /// Override the response cache lifetime in hours.
    #[arg(long = "cache-ttl-hours", value_name = "HOURS")]
    pub cache_ttl_hours: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub routing: RoutingOverrides,

    /// Request path to resolve, e.g. `/demo/en/workflow/show/3`.
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Query parameter as KEY=VALUE; may be repeated.
    #[arg(long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// HTTP method of the simulated request.
    #[arg(long, default_value = "GET")]
    pub method: String,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub routing: RoutingSettings,
    pub site: SiteSettings,
    pub cache: CacheSettings,
    pub tenants: Vec<Tenant>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub max_body_bytes: usize,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Settings consumed by the routing core. Owned by the deployment, read-only here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingSettings {
    pub path_info: bool,
    pub restful_urls: bool,
    pub script_name: String,
    pub base_url: Option<String>,
    pub default_page: String,
    pub api_version: String,
    pub component_max_depth: usize,
    pub installed: bool,
    pub maintenance: bool,
    pub sessions_enabled: bool,
    /// Tenant path → base URL. Links to such tenants omit the tenant segment.
    pub base_url_overrides: BTreeMap<String, String>,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            path_info: true,
            restful_urls: false,
            script_name: DEFAULT_SCRIPT_NAME.to_string(),
            base_url: None,
            default_page: DEFAULT_PAGE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            component_max_depth: DEFAULT_COMPONENT_MAX_DEPTH,
            installed: true,
            maintenance: false,
            sessions_enabled: true,
            base_url_overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSettings {
    pub title: String,
    pub locales: SiteLocales,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_SITE_TITLE.to_string(),
            locales: SiteLocales {
                primary: DEFAULT_LOCALE.to_string(),
                supported: vec![DEFAULT_LOCALE.to_string()],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_hours: NonZeroU32,
    pub directory: PathBuf,
    pub cacheable_pages: Vec<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_hours: NonZeroU32::new(DEFAULT_CACHE_TTL_HOURS).unwrap_or(NonZeroU32::MIN),
            directory: PathBuf::from(DEFAULT_CACHE_DIR),
            cacheable_pages: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Resolve(args)) => raw.apply_routing_overrides(&args.routing),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    routing: RawRoutingSettings,
    site: RawSiteSettings,
    cache: RawCacheSettings,
    tenants: Vec<Tenant>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(directory) = overrides.cache_directory.as_ref() {
            self.cache.directory = Some(directory.clone());
        }
        if let Some(hours) = overrides.cache_ttl_hours {
            self.cache.ttl_hours = Some(hours);
        }

        self.apply_routing_overrides(&overrides.routing);
    }

    fn apply_routing_overrides(&mut self, overrides: &RoutingOverrides) {
        if let Some(path_info) = overrides.path_info {
            self.routing.path_info = Some(path_info);
        }
        if let Some(restful) = overrides.restful_urls {
            self.routing.restful_urls = Some(restful);
        }
        if let Some(base_url) = overrides.base_url.as_ref() {
            self.routing.base_url = Some(base_url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            routing,
            site,
            cache,
            tenants,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let routing = build_routing_settings(routing)?;
        let site = build_site_settings(site)?;
        let cache = build_cache_settings(cache)?;
        let tenants = build_tenants(tenants)?;

        Ok(Self {
            server,
            logging,
            routing,
            site,
            cache,
            tenants,
        })
    }

    /// Every locale code known to the installation, used to recognise locale segments.
    pub fn known_locales(&self) -> Vec<String> {
        let mut locales = vec![self.site.locales.primary.clone()];
        locales.extend(self.site.locales.supported.iter().cloned());
        for tenant in &self.tenants {
            locales.push(tenant.primary_locale.clone());
            locales.extend(tenant.supported_locales.iter().cloned());
        }
        locales.sort();
        locales.dedup();
        locales
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let max_body_bytes = server.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES);
    if max_body_bytes == 0 {
        return Err(LoadError::invalid(
            "server.max_body_bytes",
            "must be greater than zero",
        ));
    }
    let max_body_bytes = usize::try_from(max_body_bytes).map_err(|_| {
        LoadError::invalid(
            "server.max_body_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(ServerSettings {
        addr,
        max_body_bytes,
        graceful_shutdown: Duration::from_secs(
            server
                .graceful_shutdown_seconds
                .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECONDS),
        ),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_routing_settings(routing: RawRoutingSettings) -> Result<RoutingSettings, LoadError> {
    let defaults = RoutingSettings::default();

    let script_name = routing.script_name.unwrap_or(defaults.script_name);
    if script_name.is_empty() || script_name.contains('/') {
        return Err(LoadError::invalid(
            "routing.script_name",
            "must be a single non-empty path segment",
        ));
    }

    let base_url = match routing.base_url {
        Some(value) if !value.trim().is_empty() => {
            let trimmed = value.trim().trim_end_matches('/').to_string();
            Url::parse(&trimmed)
                .map_err(|err| LoadError::invalid("routing.base_url", err.to_string()))?;
            Some(trimmed)
        }
        _ => None,
    };

    let default_page = routing.default_page.unwrap_or(defaults.default_page);
    if sanitize_segment(&default_page) != default_page || default_page.is_empty() {
        return Err(LoadError::invalid(
            "routing.default_page",
            "must be a non-empty identifier of [A-Za-z0-9_-]",
        ));
    }

    let api_version = routing.api_version.unwrap_or(defaults.api_version);
    if sanitize_segment(&api_version) != api_version || api_version.is_empty() {
        return Err(LoadError::invalid(
            "routing.api_version",
            "must be a non-empty identifier of [A-Za-z0-9_-]",
        ));
    }

    let component_max_depth = routing
        .component_max_depth
        .unwrap_or(defaults.component_max_depth);
    if component_max_depth < MIN_COMPONENT_DEPTH {
        return Err(LoadError::invalid(
            "routing.component_max_depth",
            format!("must be at least {MIN_COMPONENT_DEPTH}"),
        ));
    }

    let mut base_url_overrides = BTreeMap::new();
    for (tenant, value) in routing.base_url_overrides {
        let trimmed = value.trim().trim_end_matches('/').to_string();
        Url::parse(&trimmed).map_err(|err| {
            LoadError::invalid(
                "routing.base_url_overrides",
                format!("`{tenant}`: {err}"),
            )
        })?;
        base_url_overrides.insert(tenant, trimmed);
    }

    Ok(RoutingSettings {
        path_info: routing.path_info.unwrap_or(defaults.path_info),
        restful_urls: routing.restful_urls.unwrap_or(defaults.restful_urls),
        script_name,
        base_url,
        default_page,
        api_version,
        component_max_depth,
        installed: routing.installed.unwrap_or(defaults.installed),
        maintenance: routing.maintenance.unwrap_or(defaults.maintenance),
        sessions_enabled: routing.sessions_enabled.unwrap_or(defaults.sessions_enabled),
        base_url_overrides,
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let defaults = SiteSettings::default();
    let primary = site.primary_locale.unwrap_or(defaults.locales.primary);
    if primary.is_empty() {
        return Err(LoadError::invalid(
            "site.primary_locale",
            "must not be empty",
        ));
    }

    let mut supported = site
        .supported_locales
        .unwrap_or_else(|| vec![primary.clone()]);
    if !supported.contains(&primary) {
        supported.insert(0, primary.clone());
    }

    Ok(SiteSettings {
        title: site.title.unwrap_or(defaults.title),
        locales: SiteLocales { primary, supported },
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheSettings::default();

    let ttl_hours = match cache.ttl_hours {
        Some(hours) => NonZeroU32::new(hours)
            .ok_or_else(|| LoadError::invalid("cache.ttl_hours", "must be greater than zero"))?,
        None => defaults.ttl_hours,
    };

    let directory = cache.directory.unwrap_or(defaults.directory);
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.directory",
            "path must not be empty",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(defaults.enabled),
        ttl_hours,
        directory,
        cacheable_pages: cache.cacheable_pages.unwrap_or_default(),
    })
}

fn build_tenants(tenants: Vec<Tenant>) -> Result<Vec<Tenant>, LoadError> {
    let mut seen = Vec::with_capacity(tenants.len());
    for tenant in &tenants {
        if tenant.path.is_empty() || sanitize_segment(&tenant.path) != tenant.path {
            return Err(LoadError::invalid(
                "tenants.path",
                format!("`{}` must be a non-empty identifier of [A-Za-z0-9_-]", tenant.path),
            ));
        }
        if tenant.path == SITE_CONTEXT {
            return Err(LoadError::invalid(
                "tenants.path",
                format!("`{SITE_CONTEXT}` is reserved for the site context"),
            ));
        }
        if tenant.primary_locale.is_empty() {
            return Err(LoadError::invalid(
                "tenants.primary_locale",
                format!("tenant `{}` has no primary locale", tenant.path),
            ));
        }
        if seen.contains(&tenant.path) {
            return Err(LoadError::invalid(
                "tenants.path",
                format!("duplicate tenant `{}`", tenant.path),
            ));
        }
        seen.push(tenant.path.clone());
    }
    Ok(tenants)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    max_body_bytes: Option<u64>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRoutingSettings {
    path_info: Option<bool>,
    restful_urls: Option<bool>,
    script_name: Option<String>,
    base_url: Option<String>,
    default_page: Option<String>,
    api_version: Option<String>,
    component_max_depth: Option<usize>,
    installed: Option<bool>,
    maintenance: Option<bool>,
    sessions_enabled: Option<bool>,
    base_url_overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    primary_locale: Option<String>,
    supported_locales: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_hours: Option<u32>,
    directory: Option<PathBuf>,
    cacheable_pages: Option<Vec<String>>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
