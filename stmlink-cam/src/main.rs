//! stmlink-cam — entry point.
//!
//! ```text
//! stmlink-cam                         Stream the primary monitor
//! stmlink-cam --target HOST:PORT      Override the receiver address
//! stmlink-cam --test-pattern          Stream a synthetic gradient
//! stmlink-cam --listen [ADDR]         Receive and log a stream
//! stmlink-cam --config <path>         Load a custom config TOML
//! stmlink-cam --gen-config            Write default config to stdout
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stmlink_cam::config::CamConfig;
use stmlink_cam::monitor::FrameMonitor;
use stmlink_cam::service::CamService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "stmlink-cam", about = "Stream the screen as camera-style JPEG datagrams")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "stmlink-cam.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Receiver address, HOST:PORT.
    #[arg(short, long)]
    target: Option<String>,

    /// Stream a synthetic test pattern instead of the desktop.
    #[arg(long)]
    test_pattern: bool,

    /// Receive and log a stream instead of sending one.
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    listen: Option<String>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&CamConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config and apply overrides.
    let mut config = CamConfig::load(&cli.config);
    if let Some(target) = &cli.target {
        config.set_target(target)?;
    }
    if cli.test_pattern {
        config.capture.test_pattern = true;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("stmlink-cam v{}", env!("CARGO_PKG_VERSION"));

    let running = Arc::new(AtomicBool::new(true));

    if let Some(listen) = cli.listen {
        let addr: SocketAddr = if listen.is_empty() {
            config.listen_addr()?
        } else {
            listen.parse()?
        };
        let mut monitor = FrameMonitor::bind(addr).await?;
        info!("listening for frames on {}", monitor.local_addr()?);

        spawn_ctrl_c(Arc::clone(&running));
        let stats = monitor.run(&running).await?;
        info!(
            "received {} frames ({} malformed, {} out of order)",
            stats.frames, stats.malformed, stats.out_of_order
        );
        return Ok(());
    }

    info!(
        "target {}:{}, {}x{} q{}, max {} bytes",
        config.network.target_host,
        config.network.target_port,
        config.encoding.width,
        config.encoding.height,
        config.encoding.quality,
        config.encoding.max_jpeg_bytes
    );

    let service = CamService::new(config);
    spawn_ctrl_c(service.stop_handle());

    service.run().await?;
    Ok(())
}

/// Clear `running` on Ctrl-C.
fn spawn_ctrl_c(running: Arc<AtomicBool>) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        println!("Stopping...");
        info!("Ctrl-C received, shutting down");
        running.store(false, Ordering::SeqCst);
    });
}
