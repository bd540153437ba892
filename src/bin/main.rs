//! gateway-dns binary entry point.

use clap::Parser;
use gateway_dns::{telemetry, Config, DnsServer};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// DNS server answering for Gateway API route and Ingress hostnames.
#[derive(Parser, Debug)]
#[command(name = "gateway-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "gateway-dns.toml")]
    config: PathBuf,
}

/// Cancel the token on SIGINT or SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        info!("Shutdown signal received");
        cancel.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration; the file is optional so the binary runs with
    // defaults outside a cluster.
    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()).required(false))
        .add_source(
            config::Environment::with_prefix("GATEWAY_DNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        listen_addr = %config.dns.listen_addr,
        service_addr = %config.dns.service_addr,
        "Starting gateway-dns"
    );

    // Setup graceful shutdown
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    // Run DNS server
    let server = DnsServer::new(config.dns);
    if let Err(e) = server.run(cancel).await {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("gateway-dns shutdown complete");
    Ok(())
}
