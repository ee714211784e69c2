//! relayd - live frame relay
//!
//! Connects to one upstream camera, captures its stream header and fans the
//! live frame stream out to every consumer that connects.
//!
//! # Usage
//!
//! ```bash
//! # Relay a camera on port 80 to consumers on 0.0.0.0:8080
//! relayd --upstream 192.168.1.20
//!
//! # Explicit ports, verbose logging
//! relayd -u cam.local:8081 -l 127.0.0.1:9000 -v
//!
//! # Settings from a TOML file, flags still override
//! relayd -c /etc/camrelay.toml
//!
//! # Generated test stream, no camera needed
//! relayd --synthetic
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relay_core::RelayConfig;
use relayd::server::RelayServer;
use relayd::source::{FrameSource, SyntheticSource, TcpFrameSource};
use relayd::Relay;

/// relayd - fan one upstream frame stream out to many consumers
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
struct Args {
    /// Upstream address, `host` or `host:port` (port defaults to 80)
    #[arg(short = 'u', long, visible_alias = "webcam", env = "CAMRELAY_UPSTREAM")]
    upstream: Option<String>,

    /// Address to accept consumers on
    #[arg(short = 'l', long, env = "CAMRELAY_LISTEN")]
    listen: Option<SocketAddr>,

    /// Log at debug level (includes upstream read errors and frame drops)
    #[arg(short = 'v', long)]
    verbose: bool,

    /// TOML config file; flags override its values
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Serve a generated test stream instead of reading an upstream
    #[arg(long)]
    synthetic: bool,
}

impl Args {
    /// Loads the config file (if any) and applies flag overrides.
    fn into_config(self) -> Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => RelayConfig::default(),
        };

        if let Some(upstream) = self.upstream {
            config = config.with_upstream(upstream);
        }
        if let Some(listen) = self.listen {
            config = config.with_listen(listen);
        }
        if self.verbose {
            config = config.with_verbose(true);
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let synthetic = args.synthetic;
    let config = args.into_config()?;

    if config.upstream.is_none() && !synthetic {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }

    run(config, synthetic)
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose {
        "relayd=debug,relay_core=debug,relay_protocol=debug"
    } else {
        "relayd=info"
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .context("Invalid log filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

#[tokio::main]
async fn run(config: RelayConfig, synthetic: bool) -> Result<()> {
    init_tracing(config.verbose)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "relayd starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    if synthetic {
        info!("Using synthetic source");
        let source = SyntheticSource::for_max_frame_len(config.max_frame_len);
        return serve(source, config, cancel_token).await;
    }

    let upstream = config
        .upstream_addr()
        .context("No upstream address configured")?;
    info!(upstream = %upstream, "Using upstream source");
    let source = TcpFrameSource::from_config(upstream, &config);
    serve(source, config, cancel_token).await
}

async fn serve<S: FrameSource>(
    source: S,
    config: RelayConfig,
    cancel_token: CancellationToken,
) -> Result<()> {
    let listen = config.listen;

    let relay = Relay::start(source, config, cancel_token)
        .await
        .context("Failed to start relay")?;

    let server = RelayServer::new(listen, relay.clone());
    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    let stats = relay.dispatcher().stats();
    info!(
        frames_read = stats.frames_read,
        frames_dropped = stats.frames_dropped,
        reconnects = stats.reconnects,
        clients_admitted = stats.clients_admitted,
        "relayd stopped"
    );
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
