//! UDP hash balancer.
//!
//! ```text
//!   peer datagrams ──▶ UdpListener ──▶ UdpServer ──▶ AddressHashRouter
//!                     (session per    (accept      fnv1a_32(src ip) mod N
//!                      peer addr)      loop)              │
//!                                                          ▼
//!   peer replies  ◀──── listening socket ◀──────────── UdpProxy[i] ◀──▶ backend i
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use udp_hash_balancer::config::load_config;
use udp_hash_balancer::net::listener::UdpListener;
use udp_hash_balancer::observability::{logging::init_logging, metrics::init_metrics};
use udp_hash_balancer::{Shutdown, UdpServer};

#[derive(Parser)]
#[command(name = "udp-hash-balancer")]
#[command(about = "Distributes UDP sessions across backends by source address hash", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "udp-balancer.toml")]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    if cli.check {
        println!(
            "{}: ok ({} backends)",
            cli.config.display(),
            config.backends.len()
        );
        return Ok(());
    }

    init_logging(&config.observability)?;
    tracing::info!(
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "udp-hash-balancer starting"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let server = UdpServer::new(&config)?;
    let shutdown = Shutdown::new();
    let listener = UdpListener::bind(&config.listener, shutdown.subscribe()).await?;

    tokio::spawn(shutdown.clone().trigger_on_signal());
    server.run(listener).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
