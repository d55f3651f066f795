//! Stream Mediator - WebRTC signaling server
//!
//! Serves the signaling router on WebSocket until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use mediator_core::duration;
use mediator_router::Router;
use mediator_transport::{TransportServer, WebSocketServer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::{FileConfig, RouterSection, ServerSection, Settings};

/// Stream Mediator - session registry and call-setup routing for WebRTC peers
#[derive(Parser)]
#[command(name = "stream-mediator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "MEDIATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address [default: 0.0.0.0]
    #[arg(short = 'H', long, env = "MEDIATOR_HOST")]
    host: Option<String>,

    /// Port number [default: 8080]
    #[arg(short, long, env = "MEDIATOR_PORT")]
    port: Option<u16>,

    /// Outbound queue capacity per connection [default: 256]
    #[arg(long, env = "MEDIATOR_SEND_QUEUE")]
    send_queue: Option<usize>,

    /// Minimum time between cleanup passes [default: PT10M]
    #[arg(long, env = "MEDIATOR_CLEANUP_INTERVAL", value_name = "DURATION")]
    cleanup_interval: Option<String>,

    /// Age after which sessions and connections are evicted [default: PT6H]
    #[arg(long, env = "MEDIATOR_MAX_AGE", value_name = "DURATION")]
    max_age: Option<String>,

    /// Minimum time between statistics dumps [default: PT1H]
    #[arg(long, env = "MEDIATOR_STATISTICS_INTERVAL", value_name = "DURATION")]
    statistics_interval: Option<String>,

    /// Idle timeout of client connections [default: PT30M]
    #[arg(long, env = "MEDIATOR_IDLE_TIMEOUT", value_name = "DURATION")]
    idle_timeout: Option<String>,

    /// Locale for case-folding names and session ids [default: de]
    #[arg(long, env = "MEDIATOR_LOCALE")]
    locale: Option<String>,

    /// Time zone of log timestamps [default: Europe/Berlin]
    #[arg(long, env = "MEDIATOR_TIME_ZONE")]
    time_zone: Option<String>,

    /// Directory with <lang>.json dictionaries
    #[arg(long, env = "MEDIATOR_DICTIONARY_DIR")]
    dictionary_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn overrides(&self) -> FileConfig {
        FileConfig {
            server: ServerSection {
                host: self.host.clone(),
                port: self.port,
                send_queue: self.send_queue,
            },
            router: RouterSection {
                cleanup_interval: self.cleanup_interval.clone(),
                max_age: self.max_age.clone(),
                statistics_interval: self.statistics_interval.clone(),
                idle_timeout: self.idle_timeout.clone(),
                locale: self.locale.clone(),
                time_zone: self.time_zone.clone(),
                dictionary_dir: self.dictionary_dir.clone(),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(file.merge(cli.overrides()))?;

    run(settings).await
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

async fn run(settings: Settings) -> Result<()> {
    let server = WebSocketServer::bind(&settings.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind))?
        .with_config(settings.websocket.clone());
    let addr = server.local_addr()?;

    println!(
        "{} Signaling server listening on ws://{}",
        "MEDIATOR".cyan().bold(),
        addr
    );
    println!("  Locale:        {}", settings.router.locale.tag());
    println!("  Time zone:     {}", settings.router.time_zone);
    println!(
        "  Idle timeout:  {}",
        duration::format(settings.router.idle_timeout)
    );
    println!("  Max age:       {}", duration::format(settings.router.max_age));
    println!("  Press Ctrl+C to stop");

    let router = Router::new(settings.router);
    let serving = router.clone();
    let mut task = tokio::spawn(async move { serving.serve_on(server).await });

    tokio::select! {
        joined = &mut task => {
            joined.context("Server task failed")??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl+c")?;
            info!("Received shutdown signal");
            router.stop();
            task.await.context("Server task failed")??;
            router.statistics().log();
            println!("{}", "Server stopped".yellow());
        }
    }

    Ok(())
}
