//! catapultd — the Catapult daemon.
//!
//! # Usage
//!
//! ```text
//! catapultd serve --config config/config.yaml --port 8000
//! catapultd init-config config.yaml
//! ```

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use catapultd::{SHUTDOWN_TIMEOUT, Service, logging};

#[derive(Parser)]
#[command(name = "catapultd", about = "Catapult service daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server and the background event loop.
    Serve {
        /// Config file. Defaults to the first of config.yaml,
        /// config/config.yaml, /etc/catapult/config.yaml that exists.
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Override the configured bind host.
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,

        /// Emit logs as JSON lines.
        #[arg(long)]
        json_logs: bool,
    },

    /// Write an example config file.
    InitConfig {
        #[arg(default_value = "config.yaml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            json_logs,
        } => serve(config, host, port, json_logs).await,
        Command::InitConfig { path, force } => init_config(path, force),
    }
}

async fn serve(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    json_logs: bool,
) -> anyhow::Result<()> {
    let mut config =
        catapult_core::load_config(config_path.as_deref()).context("failed to load config")?;
    if let Some(host) = host {
        config.catapult.server.host = host;
    }
    if let Some(port) = port {
        config.catapult.server.port = port;
    }

    logging::init(&config.catapult.server.log_level, json_logs)?;
    info!(
        app = %config.catapult.app_name,
        version = %config.catapult.app_version,
        "Catapult daemon starting"
    );

    let mut service = Service::build(&config)?;

    let server = &config.catapult.server;
    let listener = tokio::net::TcpListener::bind((server.host.as_str(), server.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", server.host, server.port))?;
    info!(addr = %listener.local_addr()?, "API server listening");

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, service.router.clone())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    service.shutdown(SHUTDOWN_TIMEOUT).await?;
    info!("Catapult daemon stopped");
    Ok(())
}

fn init_config(path: PathBuf, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    catapult_core::write_default_config(&path)?;
    println!("wrote example config to {}", path.display());
    Ok(())
}
