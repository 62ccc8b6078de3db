//! intercept-proxy host binary.
//!
//! Loads a TOML settings file, boots every configured proxy into the
//! process-wide registry and runs until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use intercept_proxy::config::load_config;
use intercept_proxy::lifecycle::{boot, shutdown_signal};
use intercept_proxy::observability::{logging, metrics};
use intercept_proxy::Registry;

/// How long in-flight transactions may take to finish after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "intercept-proxy")]
#[command(about = "Run HTTP intercepting proxies from a settings file", long_about = None)]
struct Cli {
    /// Path to the TOML settings file.
    #[arg(short, long, default_value = "config/proxies.toml")]
    config: PathBuf,

    /// Override the configured log level.
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_config(&cli.config)?;

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(&settings.observability.log_level);
    logging::init_logging(level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        proxies = settings.proxies.len(),
        "intercept-proxy starting"
    );

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = Registry::global();
    let booted = boot(registry, &settings).await?;
    if !booted.start_failures.is_empty() {
        tracing::warn!(
            failed = booted.start_failures.len(),
            "Some proxies failed to auto-start; retrying with the rest"
        );
    }

    // Running proxies are skipped; failed auto-starts get a second attempt.
    let failures = registry.start_all().await;
    if !failures.is_empty() && failures.len() == registry.len() {
        return Err(format!("no proxy could start ({} failures)", failures.len()).into());
    }

    shutdown_signal().await;
    registry.stop_all().await;

    let drain = async {
        for proxy in registry.proxies() {
            proxy.wait_until_idle().await;
        }
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("In-flight transactions still running at exit");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
