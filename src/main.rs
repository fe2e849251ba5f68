use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use blog_server::config::{load_config, validation::validate_config, ConfigError, ServerConfig};
use blog_server::lifecycle::{startup, wait_for_signal};
use blog_server::observability::{logging, metrics};

/// Blog API server.
#[derive(Parser, Debug)]
#[command(name = "blog-server", version, about = "Blog API server with graceful shutdown")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address (e.g. 127.0.0.1:8000).
    #[arg(long)]
    bind: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = args.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        read_timeout_secs = config.timeouts.read_secs,
        write_timeout_secs = config.timeouts.write_secs,
        shutdown_timeout_secs = config.timeouts.shutdown_secs,
        "blog-server starting"
    );

    if config.observability.metrics_enabled {
        // Validated above.
        if let Ok(addr) = config.observability.metrics_address.parse::<SocketAddr>() {
            metrics::init_metrics(addr);
        }
    }

    let report = startup::run(config, wait_for_signal()).await;

    tracing::info!(
        trigger = %report.trigger,
        outcome = ?report.outcome,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Shutdown complete"
    );
    Ok(())
}
