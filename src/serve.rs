use super::config::AppConfig;
use super::db::{establish_pool, Db};
pub use super::error::Error;
use super::moderation::ModerationEngine;
use super::tracking::route::DirectionsClient;
use super::tracking::sessions::SessionStore;
use anyhow::Context as _;
use axum::{Router, extract::FromRef, routing::get};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity, log::LevelFilter};
use figment::{Figment, providers::Format as _};
use http_cache_reqwest::{CacheMode, HttpCacheOptions, MokaManager};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// The application user agent. Concatenates the package name and version. e.g. `miciudad/0.1.0`.
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// The application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;
/// The reqwest client type with middleware.
pub type Client = reqwest_middleware::ClientWithMiddleware;

#[derive(Parser, Debug, Clone)]
/// Command line arguments.
pub struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "default.toml")]
    pub config: PathBuf,
    /// The verbosity level.
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

#[derive(Clone, FromRef)]
/// The application state, shared across all routes.
pub struct AppState {
    /// The application configuration.
    pub(crate) config: AppConfig,
    /// The main database connection pool.
    pub db: Db,

    /// The HTTP client with caching middleware.
    pub client: Client,
    /// The simple HTTP client.
    pub simple_client: reqwest::Client,

    /// The content moderation engine.
    pub moderation: Arc<ModerationEngine>,
    /// The directions client used to build driver routes.
    pub directions: Arc<DirectionsClient>,
    /// The driver service session store.
    pub sessions: Arc<SessionStore>,
}

/// The main application entry point.
pub async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    // Set up trace logging to console and account for the user-provided verbosity flag.
    if args.verbosity.log_level_filter() != LevelFilter::Off {
        let lvl = match args.verbosity.log_level_filter() {
            LevelFilter::Error => tracing::Level::ERROR,
            LevelFilter::Warn => tracing::Level::WARN,
            LevelFilter::Info | LevelFilter::Off => tracing::Level::INFO,
            LevelFilter::Debug => tracing::Level::DEBUG,
            LevelFilter::Trace => tracing::Level::TRACE,
        };
        tracing_subscriber::fmt().with_max_level(lvl).init();
    }

    if !args.config.exists() {
        // Throw up a warning if the config file does not exist.
        //
        // This is not fatal because users can specify all configuration settings via
        // the environment, but the most likely scenario here is that a user accidentally
        // omitted the config file for some reason (e.g. forgot to mount it into Docker).
        warn!(
            "configuration file {} does not exist",
            args.config.display()
        );
    }

    // Read and parse the user-provided configuration.
    let config: AppConfig = Figment::new()
        .admerge(figment::providers::Toml::file(args.config))
        .admerge(figment::providers::Env::prefixed("MICIUDAD_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    if config.vision.api_key.is_none() {
        warn!("no vision api key configured; moderation will run text-only");
    }
    if config.toxicity.api_key.is_none() {
        warn!("no toxicity api key configured; relying on the local insult detector");
    }
    if config.directions.api_key.is_none() {
        warn!("no directions api key configured; driver routes will be empty");
    }

    // Initialize metrics reporting.
    super::metrics::setup(&config.metrics).context("failed to set up metrics exporter")?;

    // Create a reqwest client that will be used for all outbound requests.
    let simple_client = reqwest::Client::builder()
        .user_agent(APP_USER_AGENT)
        .build()
        .context("failed to build requester client")?;
    let client = reqwest_middleware::ClientBuilder::new(simple_client.clone())
        .with(http_cache_reqwest::Cache(http_cache_reqwest::HttpCache {
            mode: CacheMode::Default,
            manager: MokaManager::default(),
            options: HttpCacheOptions::default(),
        }))
        .build();

    // Create a database connection manager and pool for the main database.
    if let Some(dir) = config.db.strip_prefix("sqlite://").and_then(|p| {
        std::path::Path::new(p).parent().map(PathBuf::from)
    }) {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(&dir)
                .await
                .context("failed to create database directory")?;
        }
    }
    let pool = establish_pool(&config.db)
        .await
        .context("failed to establish database connection pool")?;

    let moderation = Arc::new(ModerationEngine::new(simple_client.clone(), &config));
    let directions = Arc::new(DirectionsClient::new(
        client.clone(),
        config.directions.clone(),
    ));
    let sessions = Arc::new(SessionStore::new(config.tracking));

    let addr = config
        .listen_address
        .unwrap_or(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000));

    let app = Router::new()
        .route("/", get(super::index))
        .merge(super::endpoints::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            config: config.clone(),
            db: pool.clone(),
            client: client.clone(),
            simple_client,
            moderation,
            directions,
            sessions,
        });

    info!("listening on {addr}");
    info!("connect to: http://127.0.0.1:{}", addr.port());

    let listener = TcpListener::bind(&addr)
        .await
        .context("failed to bind address")?;

    axum::serve(listener, app.into_make_service())
        .await
        .context("failed to serve app")
}
