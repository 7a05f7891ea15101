//! # Sync Loop
//!
//! Detects height stagnation — this node's last committed height hasn't
//! advanced since the previous tick — and pulls a `(block, certificate)`
//! pair for the next height from a peer, committing it through the same
//! [`ConsensusDriver::commit`] path the quorum-certificate path uses.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::config::SYNC_MAX_BACKOFF_FAILURES;
use crate::consensus::driver::ConsensusDriver;
use crate::consensus::traits::ValidatorOracle;

#[derive(Debug, Error)]
pub enum SyncLoopError {
    #[error("shutdown requested")]
    Shutdown,
}

/// Attempt to pull and commit the block at `last_height + 1` from any peer.
/// Returns `true` iff a commit succeeded (or the height already advanced
/// behind our back, in which case there's nothing to do and we report
/// success so the backoff counter resets).
async fn try_sync_next_height(driver: &ConsensusDriver) -> bool {
    let target = driver.last_header().height + 1;

    for peer in driver.peers() {
        if &peer == driver.self_peer() {
            continue;
        }
        let block = match driver.peer_client().pull_block(&peer.address, target).await {
            Ok(Some(block)) => block,
            Ok(None) => continue,
            Err(e) => {
                debug!(peer = %peer.address, error = %e, "pull_block failed during sync");
                continue;
            }
        };
        let hash = block.hash();
        let certificate = match driver.peer_client().pull_certificate(&peer.address, &hash).await {
            Ok(Some(certificate)) => certificate,
            Ok(None) => continue,
            Err(e) => {
                debug!(peer = %peer.address, error = %e, "pull_certificate failed during sync");
                continue;
            }
        };

        if !certificate.verify_all(driver.config().chain_id, driver.roster_len()) {
            warn!(peer = %peer.address, height = target, "peer offered a certificate that failed verification, ignoring");
            continue;
        }

        let last_header = driver.last_header();
        match driver.oracle().validate_body(&last_header, &block).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(peer = %peer.address, height = target, "peer offered a block body that failed oracle revalidation, ignoring");
                continue;
            }
            Err(e) => {
                debug!(peer = %peer.address, height = target, error = %e, "oracle revalidation failed during sync");
                continue;
            }
        }

        match driver.commit(block, certificate).await {
            Ok(()) => return true,
            Err(e) => {
                warn!(peer = %peer.address, height = target, error = %e, "commit during sync failed");
                continue;
            }
        }
    }
    false
}

/// The sync loop body: run until `shutdown` fires.
pub async fn run(driver: Arc<ConsensusDriver>, mut shutdown: watch::Receiver<bool>) -> Result<(), SyncLoopError> {
    let mut last_observed_height = driver.last_header().height;
    let mut consecutive_failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            return Err(SyncLoopError::Shutdown);
        }

        let current_height = driver.last_header().height;
        if current_height == last_observed_height {
            if try_sync_next_height(&driver).await {
                consecutive_failures = 0;
            } else {
                consecutive_failures = consecutive_failures.saturating_add(1);
            }
        } else {
            consecutive_failures = 0;
        }
        last_observed_height = driver.last_header().height;

        let delay = if consecutive_failures == 0 {
            driver.config().block_interval_ms
        } else if consecutive_failures <= SYNC_MAX_BACKOFF_FAILURES {
            driver.config().block_interval_ms * (1u64 << consecutive_failures.min(SYNC_MAX_BACKOFF_FAILURES))
        } else {
            driver.config().block_interval_ms
        };

        tokio::select! {
            _ = sleep(std::time::Duration::from_millis(delay)) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Err(SyncLoopError::Shutdown);
                }
            }
        }
    }
}

/// Supervise [`run`], restarting it on panic until shutdown is requested.
pub async fn run_supervised(driver: Arc<ConsensusDriver>, shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        let task_driver = driver.clone();
        let task_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move { run(task_driver, task_shutdown).await });
        match handle.await {
            Ok(Ok(())) | Ok(Err(SyncLoopError::Shutdown)) => return,
            Err(join_error) => {
                error!(error = %join_error, "sync loop panicked, restarting");
            }
        }
        if *shutdown.borrow() {
            return;
        }
    }
}
