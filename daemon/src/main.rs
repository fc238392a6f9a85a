//! lattice daemon: entry point for running a node.

use anyhow::Context;
use clap::Parser;
use lattice_node::{init_logging, LogFormat, Node, NodeConfig};
use lattice_types::Network;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lattice-daemon", about = "lattice election node daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, global = true, env = "LATTICE_CONFIG")]
    config: Option<PathBuf>,

    /// Network: "live", "beta" or "dev".
    #[arg(long, global = true, env = "LATTICE_NETWORK")]
    network: Option<Network>,

    /// Data directory for the LMDB store.
    #[arg(long, global = true, env = "LATTICE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log format: "human" or "json".
    #[arg(long, global = true, env = "LATTICE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, global = true, env = "LATTICE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Serve prometheus metrics.
    #[arg(long, global = true, env = "LATTICE_ENABLE_METRICS")]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Operate the node.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Print the effective configuration as TOML and exit.
    #[command(name = "init-config")]
    InitConfig,
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run the node until SIGINT or SIGTERM.
    Run,
}

impl Cli {
    /// File config (or network defaults) with CLI overrides applied.
    fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => NodeConfig::for_network(self.network.unwrap_or_default()),
        };
        if let Some(network) = self.network {
            config.network = network;
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config.enable_metrics |= self.metrics;
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.node_config()?;

    match cli.command {
        Command::InitConfig => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Node { action } => match action {
            NodeAction::Run => run(config).await?,
        },
    }
    Ok(())
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    init_logging(config.log_format, &config.log_level)?;
    tracing::info!(
        network = config.network.as_str(),
        data_dir = %config.data_dir.display(),
        backend = ?config.store_backend,
        metrics = if config.enable_metrics {
            config.metrics_port.to_string()
        } else {
            "off".into()
        },
        "starting lattice node"
    );

    let node = Arc::new(Node::open(config).context("opening node")?);
    node.start().context("starting background tasks")?;

    let reason = node.shutdown_controller().wait_for_signal().await;
    tracing::info!(%reason, "shutdown signal received, stopping node");
    node.stop().await;

    tracing::info!("lattice daemon exited cleanly");
    Ok(())
}
