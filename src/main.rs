use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use viewstats::analytics::AnalyticsService;
use viewstats::clock::{Clock, SystemClock};
use viewstats::config::AppConfig;
use viewstats::registry::InMemoryRegistry;

#[derive(Parser)]
#[command(name = "viewstats", about = "View analytics with rate-limited ingest")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "viewstats=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(Some(&cli.config))?;

    if let Err(msg) = config.validate() {
        eprintln!("Configuration error: {msg}");
        return Err(msg.into());
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        cache_ttl_secs = config.cache.ttl_secs,
        "starting viewstats"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(InMemoryRegistry::new());
    let service = Arc::new(AnalyticsService::from_config(
        &config,
        registry.clone(),
        clock.clone(),
    ));

    // Spawn rate window cleanup
    let cleanup_handle = service.limiter().start_cleanup_task(
        clock,
        std::time::Duration::from_secs(config.rate_limit.cleanup_interval_secs),
    );

    let app = viewstats::routes::build_router(service, registry);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cleanup_handle.abort();
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    tracing::info!("shutting down...");
}
