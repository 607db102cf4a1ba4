//! Record advertisement example
//!
//! Plays the host process: every command line argument is one
//! `bonjour-register` entry. Records stay registered until Ctrl-C.
//!
//! ```text
//! cargo run --example advertise -- myhost "name=api,ip=192.168.1.5,unique=1"
//! ```

use bonjour_records::{BonjourConfig, BonjourPlugin};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let entries: Vec<String> = std::env::args().skip(1).collect();
    if entries.is_empty() {
        eprintln!("usage: advertise <entry>...");
        std::process::exit(2);
    }

    let config = BonjourConfig::new().with_records(entries);
    let mut plugin = BonjourPlugin::new(config);

    // registration runs before the runtime starts serving anything
    if let Err(e) = tokio::task::block_in_place(|| plugin.post_init()) {
        error!("[bonjour] {}", e);
        std::process::exit(1);
    }

    info!("Advertising {} records, press Ctrl-C to stop", plugin.registered().len());
    tokio::signal::ctrl_c().await?;

    plugin.shutdown();
    info!("Advertisement example completed");
    Ok(())
}
