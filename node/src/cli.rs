//! # CLI Interface
//!
//! Defines the command-line argument structure for `nova-dbft-node` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `status`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// NOVA dBFT validator node.
///
/// Runs the delegated Byzantine-fault-tolerant consensus engine for a fixed
/// delegate roster, serves the peer wire protocol and operator API, and
/// exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(name = "nova-dbft-node", about = "NOVA dBFT consensus node", version, propagate_version = true)]
pub struct NodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Generate a fresh Ed25519 keypair for use in a delegate roster entry.
    Init(InitArgs),
    /// Query the status of a running node via its RPC endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (TOML). See `NodeConfig` for schema.
    #[arg(long, short = 'c', env = "NOVA_CONFIG")]
    pub config: PathBuf,

    /// Overrides `data_dir` from the config file.
    #[arg(long, short = 'd', env = "NOVA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Overrides `rpc_port` from the config file.
    #[arg(long, env = "NOVA_RPC_PORT")]
    pub rpc_port: Option<u16>,

    /// Overrides `metrics_port` from the config file.
    #[arg(long, env = "NOVA_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long, env = "NOVA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Where to write the generated private key (hex-encoded).
    #[arg(long, short = 'o', default_value = "validator.key")]
    pub out: PathBuf,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// RPC endpoint of the running node.
    #[arg(long, default_value = "http://127.0.0.1:9741")]
    pub rpc_url: String,
}
