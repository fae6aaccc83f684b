//! stmlink-switch — entry point.
//!
//! ```text
//! stmlink-switch                       Connect with defaults
//! stmlink-switch --broker <host>       Override the broker host
//! stmlink-switch --topic <topic>       Override the topic
//! stmlink-switch --config <path>       Load a custom config TOML
//! stmlink-switch --gen-config          Write default config to stdout
//! ```

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stmlink_core::switch::{MqttLink, SessionEnd, SwitchSession};

use stmlink_switch::config::SwitchConfig;
use stmlink_switch::terminal::{CrlfWriter, RawModeGuard, TerminalKeys};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "stmlink-switch", about = "Send ON/OFF to an MQTT topic from the keyboard")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "stmlink-switch.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Broker host (overrides config).
    #[arg(short, long)]
    broker: Option<String>,

    /// Broker port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Topic to publish to (overrides config).
    #[arg(short, long)]
    topic: Option<String>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&SwitchConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = SwitchConfig::load(&cli.config);
    if let Some(host) = cli.broker {
        config.broker.host = host;
    }
    if let Some(port) = cli.port {
        config.broker.port = port;
    }
    if let Some(topic) = cli.topic {
        config.broker.topic = topic;
    }

    // Logs go to stderr with CRLF line ends; stdout is the console.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(CrlfWriter::stderr)
        .init();

    info!("stmlink-switch v{}", env!("CARGO_PKG_VERSION"));

    let broker = config.to_broker_config();
    broker.validate()?;

    // 1. Connect. Failure here ends the program before any input is read.
    println!("connecting to {}:{}...", broker.host, broker.port);
    let (link, events) = match MqttLink::connect(&broker).await {
        Ok(pair) => pair,
        Err(e) => {
            error!("{e}");
            eprintln!("failed to connect to MQTT broker: {e}");
            std::process::exit(1);
        }
    };

    // 2. Raw mode for single-key input.
    let raw = match RawModeGuard::enable() {
        Ok(guard) => guard,
        Err(e) => {
            if let Err(e) = link.shutdown().await {
                warn!("disconnect failed: {e}");
            }
            return Err(e.into());
        }
    };

    // 3. Poll keys until quit or interrupt.
    let mut session = SwitchSession::new(TerminalKeys, link, events, io::stdout(), broker.topic.clone())
        .with_poll_interval(config.poll_interval());

    let outcome = tokio::select! {
        end = session.run() => end,
        _ = tokio::signal::ctrl_c() => {
            println!("\r\ninterrupted by user\r");
            Ok(SessionEnd::Interrupted)
        }
    };

    // 4. Tear down on every path.
    drop(raw);
    match &outcome {
        Ok(end) => info!("session ended: {end:?}"),
        Err(e) => error!("session failed: {e}"),
    }

    let link = session.into_publisher();
    if let Err(e) = link.shutdown().await {
        warn!("disconnect failed: {e}");
    }
    println!("disconnected from MQTT broker");

    outcome?;
    Ok(())
}
