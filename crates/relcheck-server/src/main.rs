use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use relcheck_core::model::{parse_model, validate_model};
use relcheck_server::auth;
use relcheck_server::cache::DecisionCache;
use relcheck_server::cli::{Cli, Command};
use relcheck_server::config::{AppConfig, LogFormat};
use relcheck_server::metrics::Metrics;
use relcheck_server::middleware::auth::AuthState;
use relcheck_server::rest;
use relcheck_server::service::AuthzService;
use relcheck_storage::{InMemoryStore, run_gc_cycle};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json();
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty();
            registry.with(fmt_layer).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Some(Command::GenerateApiKey) => run_generate_api_key(),
        Some(Command::ValidateModel { file }) => run_validate_model(&config, &file),
        Some(Command::Serve) | None => run_serve(config).await,
    }
}

fn run_generate_api_key() -> Result<(), Box<dyn std::error::Error>> {
    let key = auth::generate_api_key();
    let key_hash = auth::hash_secret(&key.secret)?;

    println!("API key generated");
    println!("  API Key: {}", key.full_key);
    println!();
    println!("Add this entry to the server config:");
    println!();
    println!("[[auth.api_keys]]");
    println!("key_id = \"{}\"", key.key_id);
    println!("key_hash = \"{key_hash}\"");
    println!();
    println!("Store the key securely; it will not be shown again.");
    Ok(())
}

fn run_validate_model(config: &AppConfig, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let definition = std::fs::read_to_string(file)
        .map_err(|e| format!("failed to read '{}': {e}", file.display()))?;
    let model = parse_model(&definition)?;

    if let Err(errors) = validate_model(&model, &config.to_model_limits()) {
        for error in &errors {
            eprintln!("  {error}");
        }
        return Err(format!("model has {} validation error(s)", errors.len()).into());
    }

    let relations: usize = model.types.iter().map(|t| t.relations.len()).sum();
    println!(
        "{} is valid: {} types, {relations} relations",
        file.display(),
        model.types.len()
    );
    Ok(())
}

async fn run_serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        http_addr = %config.http_addr(),
        max_depth = config.engine.max_depth,
        cache_enabled = config.cache.enabled,
        "starting relcheck server"
    );

    let store = Arc::new(InMemoryStore::new());
    let metrics = Arc::new(Metrics::new());
    let service = Arc::new(
        AuthzService::new(
            Arc::clone(&store),
            config.to_engine_config(),
            config.to_model_limits(),
        )
        .with_cache(DecisionCache::new(&config.cache))
        .with_metrics(Arc::clone(&metrics)),
    );

    let auth = AuthState::from_entries(&config.auth.api_keys);
    if auth.is_dev_mode() {
        tracing::warn!("no api keys configured; authentication is disabled");
    }

    let state = rest::AppState {
        service,
        metrics: Arc::clone(&metrics),
    };
    let router = rest::create_router(state, auth);

    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let gc_task = (config.gc.interval_secs > 0).then(|| {
        tokio::spawn(run_gc_loop(
            Arc::clone(&store),
            Duration::from_secs(config.gc.interval_secs),
            config.gc.retain_revisions,
            shutdown_rx.clone(),
        ))
    });

    let addr: std::net::SocketAddr = config.http_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    let mut server_rx = shutdown_rx;
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = server_rx.changed().await;
    });

    tokio::spawn(shutdown_signal(shutdown_tx));
    if let Err(e) = server.await {
        tracing::error!(error = %e, "HTTP server error");
    }

    if let Some(task) = gc_task {
        let _ = task.await;
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn run_gc_loop(
    store: Arc<InMemoryStore>,
    interval: Duration,
    retain_revisions: u64,
    mut shutdown: watch::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_gc_cycle(&*store, retain_revisions).await {
                    tracing::error!(error = %e, "compaction failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn shutdown_signal(shutdown_tx: watch::Sender<()>) {
    let ctrl_c = tokio::signal::ctrl_c();

    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => { tracing::info!("received SIGINT"); }
                _ = sigterm.recv() => { tracing::info!("received SIGTERM"); }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler, using SIGINT only");
            let _ = ctrl_c.await;
            tracing::info!("received SIGINT");
        }
    }

    let _ = shutdown_tx.send(());
}
