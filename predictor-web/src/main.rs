//! predictor-web - census income prediction front-end
//!
//! Serves the single-record, database and file prediction endpoints and
//! forwards every record to the remote scoring API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use predictor_common::config::{self, ConfigOverrides, ServiceConfig};
use predictor_common::logging::{self, JsonLinesCollector, TracingCollector};
use predictor_common::CollectorHandle;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use predictor_web::scorer::HttpScorer;
use predictor_web::AppState;

/// Command-line arguments for predictor-web
///
/// Environment variables and the TOML file are consulted for anything not
/// given here.
#[derive(Parser, Debug)]
#[command(name = "predictor-web")]
#[command(about = "Census income prediction front-end")]
#[command(version)]
struct Args {
    /// Path to config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scoring endpoint URL
    #[arg(long)]
    api_url: Option<String>,

    /// Address to bind
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// JSON-lines file receiving collector entries
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "predictor_web=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "predictor-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let toml_config = config::load_toml_config_or_default(args.config.as_deref());
    let service_config = ServiceConfig::resolve(
        ConfigOverrides {
            api_url: args.api_url,
            bind_address: args.bind,
            port: args.port,
            collector_file: args.log_file,
        },
        &toml_config,
    )
    .context("Invalid configuration")?;

    let collector = logging::init_global(open_collector(&service_config));
    info!("Scoring endpoint: {}", service_config.api_url);

    let scorer = HttpScorer::new(service_config.api_url.clone())
        .context("Failed to initialize scoring client")?;
    let state = AppState::new(Arc::new(scorer), collector.clone());
    let app = predictor_web::build_router(state);

    let addr = service_config.listen_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    collector.flush();
    info!("Server shutdown complete");
    Ok(())
}

/// JSON-lines collector when a file is configured, tracing otherwise
fn open_collector(config: &ServiceConfig) -> CollectorHandle {
    match &config.collector_file {
        Some(path) => match JsonLinesCollector::open(path) {
            Ok(collector) => {
                info!("Log collector: {}", path.display());
                CollectorHandle::new(collector)
            }
            Err(e) => {
                warn!(
                    "Cannot open log collector file {}: {}; logging to tracing only",
                    path.display(),
                    e
                );
                CollectorHandle::new(TracingCollector)
            }
        },
        None => CollectorHandle::new(TracingCollector),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
