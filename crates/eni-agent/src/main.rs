//! ENI Agent Entry Point
//!
//! Loads the agent configuration and a pair of node snapshots, dispatches
//! one reconciliation and waits for the background device setup to drain.

use anyhow::{Context, Result};
use clap::Parser;
use eni_agent::{AgentConfig, EniReconciler, ProcSysctl};
use eni_types::NodeSnapshot;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "eni-agent", version, about = "Configure newly attached ENI devices")]
struct Args {
    /// Agent configuration file
    #[arg(long, default_value = eni_agent::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Current node snapshot (JSON)
    #[arg(long)]
    node: PathBuf,

    /// Previously observed node snapshot (JSON)
    #[arg(long)]
    previous_node: Option<PathBuf>,

    /// Log filter, overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref())?;

    info!("Starting eni-agent");

    let config = AgentConfig::load_or_default(&args.config)?;
    config.validate()?;

    let current = read_snapshot(&args.node)?;
    let prior = args
        .previous_node
        .as_deref()
        .map(read_snapshot)
        .transpose()?;

    let reconciler = build_reconciler(&config)?;
    reconciler.on_node_update(prior.as_ref(), &current);

    tokio::select! {
        _ = reconciler.shutdown() => {
            info!("ENI device setup complete");
        }
        _ = signal::ctrl_c() => {
            warn!(
                in_flight = reconciler.in_flight(),
                "Received SIGINT, abandoning in-flight ENI device setup"
            );
        }
    }

    Ok(())
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logger: {e}"))
}

fn read_snapshot(path: &Path) -> Result<NodeSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read node snapshot {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse node snapshot {}", path.display()))
}

#[cfg(target_os = "linux")]
fn build_reconciler(config: &AgentConfig) -> Result<EniReconciler> {
    let links = eni_agent::RtNetlinkOps::new().context("Failed to open netlink socket")?;
    let sysctl = ProcSysctl::new(&config.sysctl.proc_root);
    Ok(EniReconciler::from_config(
        config,
        Arc::new(links),
        Arc::new(sysctl),
    ))
}

#[cfg(not(target_os = "linux"))]
fn build_reconciler(_config: &AgentConfig) -> Result<EniReconciler> {
    anyhow::bail!("eni-agent requires Linux netlink support")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "eni-agent",
            "--node",
            "/tmp/node.json",
            "--previous-node",
            "/tmp/prev.json",
        ])
        .unwrap();
        assert_eq!(args.node, PathBuf::from("/tmp/node.json"));
        assert_eq!(args.previous_node, Some(PathBuf::from("/tmp/prev.json")));
        assert_eq!(
            args.config,
            PathBuf::from(eni_agent::config::DEFAULT_CONFIG_PATH)
        );
    }

    #[test]
    fn test_node_is_required() {
        assert!(Args::try_parse_from(["eni-agent"]).is_err());
    }

    #[test]
    fn test_read_snapshot_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"{not json").unwrap();
        assert!(read_snapshot(file.path()).is_err());
    }
}
