use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lora_broker::broker::Broker;
use lora_broker::config::Config;
use lora_broker::storage::{MemoryStorage, Storage};
use lora_broker::udp;

#[derive(Parser)]
#[command(name = "lora-broker")]
#[command(about = "LoRaWAN broker: authenticates uplinks and forwards them to handlers")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config from {:?}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("lora-broker v{}", env!("CARGO_PKG_VERSION"));

    let storage = MemoryStorage::new();
    for device in &config.devices {
        storage.store_device(device).await?;
        info!(
            "Seeded device {} (DevAddr {}) for application {}",
            device.dev_eui,
            device.dev_addr(),
            device.app_eui
        );
    }
    let broker = Arc::new(Broker::new(storage));

    tokio::select! {
        result = udp::run_server(&config, broker) => {
            if let Err(e) = &result {
                error!("UDP server failed: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
