//! Main entry point for the matchwatch live tracking service
//!
//! Loads configuration, initializes logging, builds the service with the
//! in-process source and transport, serves the health endpoints and stops
//! the workers gracefully on SIGINT/SIGTERM.

use anyhow::Result;
use clap::Parser;
use matchwatch::config::AppConfig;
use matchwatch::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use matchwatch::service::{HealthCheck, HealthStatus, LiveMatchService};
use matchwatch::source::InMemoryGameSource;
use matchwatch::transport::LocalHub;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Matchwatch - live match tracking and update distribution service
#[derive(Parser)]
#[command(
    name = "matchwatch",
    version,
    about = "Tracks live matches and fans out match, performance and rank updates",
    long_about = "Matchwatch keeps live state for every match someone is watching, refreshes it \
                 on a fixed interval and delivers updates to subscribed clients through bounded \
                 drop-on-full queues served by a fixed pool of dispatch workers."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Health port override
    #[arg(long, value_name = "PORT", help = "Override health and metrics server port")]
    health_port: Option<u16>,

    /// Poll interval override
    #[arg(long, value_name = "SECONDS", help = "Override live match poll interval")]
    poll_interval: Option<u64>,

    /// Fixture file for the in-memory game source
    #[arg(
        long,
        value_name = "FILE",
        help = "JSON fixtures (live games, histories, match details, player stats)"
    )]
    fixtures: Option<PathBuf>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Matchwatch Live Tracking Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!("   Poll interval: {}s", config.tracking.poll_interval_seconds);
    info!(
        "   Queue capacities: match={} performance={} rank={}",
        config.tracking.match_queue_capacity,
        config.tracking.performance_queue_capacity,
        config.tracking.rank_queue_capacity
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from file or environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(port) = args.health_port {
        config.service.health_port = port;
    }

    if let Some(interval) = args.poll_interval {
        config.tracking.poll_interval_seconds = interval;
    }

    matchwatch::config::validate_config(&config)?;
    Ok(config)
}

fn load_source(args: &Args) -> Result<Arc<InMemoryGameSource>> {
    match &args.fixtures {
        Some(path) => {
            info!("Loading game source fixtures from: {}", path.display());
            Ok(Arc::new(InMemoryGameSource::from_json_file(path)?))
        }
        None => {
            warn!("No fixtures given; the in-memory game source starts empty");
            Ok(Arc::new(InMemoryGameSource::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let source = load_source(&args)?;
    let transport = Arc::new(LocalHub::new(config.tracking.connection_buffer));
    let collector = Arc::new(MetricsCollector::new()?);

    let service = match LiveMatchService::with_metrics(
        config.clone(),
        source.clone(),
        source,
        transport,
        collector.clone(),
    ) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Failed to initialize service: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = service.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let health_server = Arc::new(
        HealthServer::new(
            HealthServerConfig {
                port: config.service.health_port,
                host: "0.0.0.0".to_string(),
            },
            collector.clone(),
        )
        .with_service(service.clone()),
    );
    let metrics_service = MetricsService::new(collector, health_server);

    let metrics_task = {
        let metrics_service = metrics_service.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            }
        })
    };

    info!("✅ Matchwatch is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");

    if let Err(e) = service.stop().await {
        warn!("Service stop reported an error: {}", e);
    }

    if let Err(e) = metrics_service.stop().await {
        warn!("Failed to stop metrics service: {}", e);
    }
    if tokio::time::timeout(config.shutdown_timeout(), metrics_task)
        .await
        .is_err()
    {
        warn!("⚠️  Health server did not stop in time");
    }

    match HealthCheck::check(service).await {
        Ok(health) if health.status == HealthStatus::Unhealthy => {
            info!(
                "Final state: {} tracked matches, {} watchers",
                health.stats.tracked_matches, health.stats.watchers
            );
        }
        Ok(health) => warn!("Unexpected health after stop: {}", health.status),
        Err(e) => warn!("Final health check failed: {}", e),
    }

    info!("🛑 Matchwatch stopped");
    Ok(())
}
