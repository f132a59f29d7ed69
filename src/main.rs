use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use turnstile::config::{LoggingConfig, TurnstileConfig};
use turnstile::http::{AppState, HttpServer};
use turnstile::ratelimit::housekeeping::{load_rules, spawn_rules_reloader, spawn_sweeper};
use turnstile::ratelimit::{PolicyTable, Quota, RateLimitRules, RateLimiter};

/// Fixed-window rate limit decision service.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address for the HTTP server, overriding the configuration
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Path to the per-purpose rules file, overriding the configuration
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TurnstileConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    if let Some(rules) = &args.rules {
        config.rate_limiting.rules_path = Some(rules.display().to_string());
    }
    if args.log_json {
        config.logging.json = true;
    }

    init_tracing(&config.logging);

    info!("Starting Turnstile Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(http_addr = %config.server.http_addr, "Configuration loaded");

    let default_quota = Quota::new(
        config.rate_limiting.default_window_ms,
        config.rate_limiting.default_max,
    );
    let rules_path = config.rate_limiting.rules_path.as_ref().map(PathBuf::from);
    let rules = match &rules_path {
        Some(path) => load_rules(path, default_quota)?,
        None => RateLimitRules::with_default(default_quota),
    };
    info!(policies = rules.policies.len(), "Rate limit rules loaded");

    let policies = Arc::new(PolicyTable::new(rules));
    let rate_limiter = Arc::new(RateLimiter::new());
    info!("Rate limiter initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    if let Some(every) = config.rate_limiting.sweep_interval() {
        tasks.push(spawn_sweeper(rate_limiter.clone(), every, shutdown_rx.clone()));
    }
    if let (Some(path), Some(every)) = (rules_path, config.rate_limiting.rules_reload_interval()) {
        tasks.push(spawn_rules_reloader(
            policies.clone(),
            path,
            default_quota,
            every,
            shutdown_rx.clone(),
        ));
    }

    let state = AppState::new(rate_limiter, policies)
        .trust_forwarded_headers(config.server.trust_forwarded_headers);
    let server = HttpServer::new(config.server.http_addr, state);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    let _ = shutdown_tx.send(true);
    for task in tasks {
        task.await?;
    }

    info!("Turnstile Rate Limiting Service stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
