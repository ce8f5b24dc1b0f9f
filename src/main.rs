//! controller-bridge - event bridge for the multi-room audio controller.
//!
//! Connects to the controller socket, joins the browser channel, and
//! forwards events into named UI ports. Run standalone it tails the port
//! traffic to the log, which makes it a handy protocol monitor.
//!
//! ```bash
//! # Current wire vocabulary, default endpoint
//! controller-bridge
//!
//! # Older backend
//! controller-bridge --url ws://music.local/controller/websocket --legacy
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use controller_bridge::bridge::{BindingTable, Bridge};
use controller_bridge::config::{BridgeConfig, Vocabulary};
use controller_bridge::ports::PortRegistry;
use controller_bridge::transport::{PhoenixConfig, PhoenixTransport};

#[derive(Parser, Debug)]
#[command(
    name = "controller-bridge",
    about = "Event bridge for the multi-room audio controller UI"
)]
struct Args {
    /// WebSocket URL of the controller socket.
    #[arg(long)]
    url: Option<String>,

    /// Channel topic to join.
    #[arg(long)]
    topic: Option<String>,

    /// Path to a TOML config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Use the legacy underscore wire vocabulary.
    #[arg(long)]
    legacy: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = BridgeConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(url) = args.url {
        config.url = url;
    }
    if let Some(topic) = args.topic {
        config.topic = topic;
    }
    if args.legacy {
        config.vocabulary = Vocabulary::Legacy;
    }

    let table = match config.vocabulary {
        Vocabulary::Current => BindingTable::current()?,
        Vocabulary::Legacy => BindingTable::legacy()?,
    };

    info!("connecting to {} (topic {})", config.url, config.topic);

    let ports = Arc::new(PortRegistry::new());

    // Tail every inbound port so standalone runs show the full event flow.
    let mut names: Vec<String> = table
        .inbound()
        .iter()
        .map(|binding| binding.port.clone())
        .collect();
    names.push(config.status_port.clone());
    names.sort();
    names.dedup();
    for name in names {
        let mut values = ports.open_inbound(&name);
        tokio::spawn(async move {
            while let Some(value) = values.recv().await {
                info!("port {} <- {}", name, value);
            }
        });
    }

    let transport = Arc::new(PhoenixTransport::connect(PhoenixConfig {
        url: config.url.clone(),
        topic: config.topic.clone(),
        reconnect_after: Duration::from_millis(config.reconnect_after_ms),
        heartbeat_interval: Duration::from_millis(config.heartbeat_interval_ms),
    }));

    let bridge = Bridge::new(table, transport, Arc::clone(&ports))
        .with_status_port(config.status_port.clone());
    bridge.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutting down");
    Ok(())
}
