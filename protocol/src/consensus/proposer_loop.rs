//! # Proposer Loop
//!
//! Wakes on a quarter-interval tick and asks the driver whether it's this
//! node's turn to propose. Before its first tick it blocks until more than
//! half the roster answers a heartbeat, so a freshly started delegate never
//! races a network partition into packing a block nobody else can see.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::LIVENESS_POLL_INTERVAL;
use crate::consensus::driver::{now_ms, ConsensusDriver};

#[derive(Debug, Error)]
pub enum ProposerLoopError {
    #[error("shutdown requested")]
    Shutdown,
}

/// Block until more than half the roster (counting this node) answers a
/// heartbeat, polling every [`LIVENESS_POLL_INTERVAL`].
async fn wait_for_quorum_liveness(driver: &ConsensusDriver) {
    loop {
        let peers = driver.peers();
        let mut reachable = 1usize; // this node counts itself live.
        for peer in &peers {
            if peer == driver.self_peer() {
                continue;
            }
            if driver.peer_client().heartbeat(&peer.address).await.is_ok() {
                reachable += 1;
            }
        }
        if reachable > peers.len() / 2 {
            info!(reachable, total = peers.len(), "quorum of delegates reachable, starting proposer loop");
            return;
        }
        warn!(reachable, total = peers.len(), "waiting for quorum liveness before proposing");
        sleep(LIVENESS_POLL_INTERVAL).await;
    }
}

/// The proposer loop body: run until `shutdown` fires.
pub async fn run(driver: Arc<ConsensusDriver>, mut shutdown: watch::Receiver<bool>) -> Result<(), ProposerLoopError> {
    wait_for_quorum_liveness(&driver).await;

    loop {
        if *shutdown.borrow() {
            return Err(ProposerLoopError::Shutdown);
        }

        let now = now_ms();
        let late_threshold = driver.config().late_threshold_ms() as i64;
        if now - driver.round_time() <= late_threshold {
            // The rightful proposer is still within its grace window.
        } else if driver.is_my_turn(now) {
            if let Err(e) = driver.propose_once(now).await {
                error!(error = %e, "proposer tick failed");
            }
        }

        tokio::select! {
            _ = sleep(driver.config().proposer_tick()) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Err(ProposerLoopError::Shutdown);
                }
            }
        }
    }
}

/// Supervise [`run`], restarting it on panic until shutdown is requested.
///
/// Mirrors the teacher's crash-resilient loop supervision: a single bad
/// iteration (a panic deep in an external trait implementation, say) never
/// takes the whole proposer loop down.
pub async fn run_supervised(driver: Arc<ConsensusDriver>, shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        let task_driver = driver.clone();
        let task_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move { run(task_driver, task_shutdown).await });
        match handle.await {
            Ok(Ok(())) | Ok(Err(ProposerLoopError::Shutdown)) => return,
            Err(join_error) => {
                error!(error = %join_error, "proposer loop panicked, restarting");
            }
        }
        if *shutdown.borrow() {
            return;
        }
    }
}
