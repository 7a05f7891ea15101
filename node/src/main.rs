// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # NOVA dBFT Validator Node
//!
//! Entry point for the `nova-dbft-node` binary. Parses CLI arguments, loads
//! the TOML node configuration, wires the consensus driver to a `sled`
//! persistence adapter, an HTTP peer client, a devnet validator oracle and
//! block builder, then starts the proposer loop, sync loop, and the peer
//! wire protocol / operator HTTP server.
//!
//! Subcommands:
//! - `run`     — start the node
//! - `init`    — generate a fresh validator keypair
//! - `status`  — query a running node's status endpoint
//! - `version` — print build version information

mod api;
mod builder;
mod cli;
mod logging;
mod metrics;
mod oracle;
mod peer_client;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use nova_dbft::config::NodeConfig;
use nova_dbft::consensus::driver::ConsensusDriver;
use nova_dbft::consensus::peer::Round;
use nova_dbft::consensus::traits::{BlockBuilder, PeerClient, ValidatorOracle};
use nova_dbft::consensus::{proposer_loop, sync_loop};
use nova_dbft::storage::block::Block;
use nova_dbft::storage::persistence::{PersistenceAdapter, SledPersistence};

use builder::EmptyBlockBuilder;
use cli::{Commands, NodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;
use oracle::DevnetOracle;
use peer_client::HttpPeerClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = NodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_keypair(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// run — node startup sequence
// ---------------------------------------------------------------------------

async fn run_node(args: cli::RunArgs) -> Result<()> {
    let log_filter = format!("nova_dbft_node={level},nova_dbft={level},tower_http=debug", level = args.log_level);
    logging::init_logging(&log_filter, LogFormat::Pretty);

    let config_text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read config file {}", args.config.display()))?;
    let mut config: NodeConfig =
        toml::from_str(&config_text).with_context(|| format!("failed to parse config file {}", args.config.display()))?;

    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir.to_string_lossy().into_owned();
    }
    if let Some(rpc_port) = args.rpc_port {
        config.rpc_port = rpc_port;
    }
    if let Some(metrics_port) = args.metrics_port {
        config.metrics_port = metrics_port;
    }

    let mode = config.resolved_mode();
    tracing::info!(
        chain_id = config.chain_id,
        mode = ?mode,
        delegates = config.delegate_set.len(),
        data_dir = %config.data_dir,
        "starting nova-dbft-node"
    );

    let data_dir = std::path::PathBuf::from(&config.data_dir);
    std::fs::create_dir_all(&data_dir).with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    let db_path = data_dir.join("db");
    let persistence: Arc<dyn PersistenceAdapter> = Arc::new(
        SledPersistence::open(&db_path).with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );

    let genesis_proposer = config
        .delegate_roster()
        .into_iter()
        .next()
        .context("delegate_set must contain at least one entry")?;
    let genesis = Block::genesis(genesis_proposer);
    if persistence.last_header().await?.is_none() {
        persistence.commit(&genesis, &empty_genesis_certificate(&genesis, config.chain_id)).await?;
        tracing::info!(height = 0, hash = %genesis.hash_hex(), "minted genesis block");
    }

    let keypair = config.this_node.keypair().context("invalid this_node.private_key")?;
    let round = Round::new(config.delegate_roster());
    let oracle: Arc<dyn ValidatorOracle> = Arc::new(DevnetOracle);
    let peer_client: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new());
    let block_builder: Arc<dyn BlockBuilder> = Arc::new(EmptyBlockBuilder);

    let driver = Arc::new(ConsensusDriver::new(
        config.consensus_config(),
        keypair,
        config.self_peer(),
        round,
        genesis.header.clone(),
        oracle,
        peer_client,
        persistence,
        block_builder,
    ));
    driver.recover().await.context("failed to recover chain tip from persistence")?;
    tracing::info!(height = driver.last_header().height, "chain tip recovered");

    let node_metrics = Arc::new(NodeMetrics::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let is_delegate = matches!(mode, nova_dbft::config::NodeMode::Delegate);
    let proposer_handle = if is_delegate {
        let driver = Arc::clone(&driver);
        let shutdown_rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            proposer_loop::run_supervised(driver, shutdown_rx).await;
        }))
    } else {
        tracing::info!("running in full mode: sync-only, no proposer loop");
        None
    };

    let sync_handle = {
        let driver = Arc::clone(&driver);
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            sync_loop::run_supervised(driver, shutdown_rx).await;
        })
    };

    let metrics_poller = {
        let driver = Arc::clone(&driver);
        let metrics = Arc::clone(&node_metrics);
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                metrics.block_height.set(driver.last_header().height);
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
                    _ = shutdown_rx.changed() => { if *shutdown_rx.borrow() { return; } }
                }
            }
        })
    };

    let app_state = api::AppState {
        driver: Arc::clone(&driver),
        version: format!("{} (wire {})", env!("CARGO_PKG_VERSION"), nova_dbft::config::WIRE_PROTOCOL_VERSION),
    };
    let rpc_router = api::create_router(app_state);
    let rpc_addr = format!("0.0.0.0:{}", config.rpc_port);
    let rpc_listener = tokio::net::TcpListener::bind(&rpc_addr).await.with_context(|| format!("failed to bind RPC listener on {rpc_addr}"))?;
    tracing::info!("peer wire protocol / operator API listening on {}", rpc_addr);

    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr).await.with_context(|| format!("failed to bind metrics listener on {metrics_addr}"))?;
    tracing::info!("metrics listening on {}", metrics_addr);

    print_startup_banner(&config, mode);

    tokio::select! {
        res = axum::serve(rpc_listener, rpc_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining loops");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = proposer_handle {
        let _ = handle.await;
    }
    let _ = sync_handle.await;
    metrics_poller.abort();

    tracing::info!("nova-dbft-node stopped");
    Ok(())
}

fn empty_genesis_certificate(genesis: &Block, chain_id: i64) -> nova_dbft::consensus::vote::Certificate {
    nova_dbft::consensus::vote::Certificate {
        chain_id,
        block_height: genesis.header.height,
        block_hash: genesis.hash(),
        votes: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// init — generate a validator keypair
// ---------------------------------------------------------------------------

fn init_keypair(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("nova_dbft_node=info", LogFormat::Pretty);

    let keypair = nova_dbft::crypto::keys::NovaKeypair::generate();
    let account = keypair.public_key_hex();
    let secret_hex = hex::encode(keypair.to_bytes());

    std::fs::write(&args.out, &secret_hex).with_context(|| format!("failed to write key to {}", args.out.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&args.out, std::fs::Permissions::from_mode(0o600))?;
    }

    println!();
    println!("Keypair generated.");
    println!("  account (public key) : {account}");
    println!("  private key file     : {}", args.out.display());
    println!();
    println!("Add `{{ account = \"{account}\", address = \"<host>:<p2p_port>\" }}` to `delegate_set`,");
    println!("and point `this_node.private_key` at the contents of {}.", args.out.display());

    Ok(())
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.rpc_url.trim_end_matches('/'));
    let client = reqwest::Client::new();
    let body = client.get(&url).send().await.context("request failed")?.text().await.context("reading response body")?;

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => {
            println!("Node Status");
            if let Some(v) = json.get("version").and_then(|v| v.as_str()) {
                println!("  Version     : {v}");
            }
            if let Some(v) = json.get("height").and_then(|v| v.as_i64()) {
                println!("  Height      : {v}");
            }
            if let Some(v) = json.get("hash").and_then(|v| v.as_str()) {
                println!("  Hash        : {v}");
            }
            if let Some(v) = json.get("quorum").and_then(|v| v.as_u64()) {
                println!("  Quorum      : {v}");
            }
            if let Some(v) = json.get("self_account").and_then(|v| v.as_str()) {
                println!("  Self        : {v}");
            }
        }
        Err(_) => println!("{body}"),
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// version
// ---------------------------------------------------------------------------

fn print_version() {
    println!("nova-dbft-node {}", env!("CARGO_PKG_VERSION"));
    println!("wire protocol   {}", nova_dbft::config::WIRE_PROTOCOL_VERSION);
    println!("rustc           {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

// ---------------------------------------------------------------------------
// Startup banner
// ---------------------------------------------------------------------------

fn print_startup_banner(config: &NodeConfig, mode: nova_dbft::config::NodeMode) {
    let lines = [
        format!("  Account:    {}", config.this_node.account),
        format!("  RPC:        0.0.0.0:{}", config.rpc_port),
        format!("  P2P:        0.0.0.0:{}", config.p2p_port),
        format!("  Data:       {}", config.data_dir),
        format!("  Mode:       {mode:?}"),
        format!("  Delegates:  {}", config.delegate_set.len()),
    ];
    let title = format!("  NOVA dBFT \u{2014} Validator Node v{}", env!("CARGO_PKG_VERSION"));
    let max_width = lines.iter().map(|l| l.len()).chain(std::iter::once(title.len())).max().unwrap_or(50) + 4;
    let border = "\u{2550}".repeat(max_width);

    println!();
    println!("\u{2554}{border}\u{2557}");
    println!("\u{2551}  {:<width$}  \u{2551}", title.trim(), width = max_width - 4);
    println!("\u{2560}{border}\u{2563}");
    for line in &lines {
        println!("\u{2551}  {:<width$}  \u{2551}", line.trim(), width = max_width - 4);
    }
    println!("\u{255A}{border}\u{255D}");
    println!();
}

// ---------------------------------------------------------------------------
// Shutdown signal
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_banner_does_not_panic() {
        let config = NodeConfig {
            chain_id: 1,
            block_interval_ns: 2_000_000_000,
            delegate_set: vec![],
            this_node: nova_dbft::config::ThisNode {
                account: "abc123".into(),
                address: "d0.example:9740".into(),
                private_key: "deadbeef".into(),
            },
            mode: nova_dbft::config::NodeMode::Full,
            genesis_accounts: vec![],
            data_dir: "./data".into(),
            rpc_port: 9741,
            p2p_port: 9740,
            metrics_port: 9742,
            log_format: "pretty".into(),
        };
        print_startup_banner(&config, nova_dbft::config::NodeMode::Full);
    }
}
