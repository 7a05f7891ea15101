//! # External Collaborator Traits
//!
//! The driver never talks to the network, a database, or a transaction
//! executor directly — it talks to these traits. The node binary wires
//! concrete implementations (HTTP peer client, `sled` persistence,
//! whatever validates transaction bodies) in at startup.

use async_trait::async_trait;
use thiserror::Error;

use crate::consensus::vote::{Certificate, Vote};
use crate::storage::block::{Block, Header};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("validator oracle unavailable: {0}")]
    Unavailable(String),
}

/// Checks whether a proposed block's opaque transaction payload is valid —
/// i.e. whether `state_root`/`tx_root` are correct given `transactions` and
/// `parent`.
///
/// This crate never executes transactions itself; it asks this oracle and
/// trusts the answer. A block whose body the oracle rejects transitions to
/// `ErrBody` and is never voted for.
#[async_trait]
pub trait ValidatorOracle: Send + Sync {
    async fn validate_body(&self, parent: &Header, block: &Block) -> Result<bool, OracleError>;
}

#[derive(Debug, Error)]
pub enum PeerClientError {
    #[error("peer {peer} unreachable: {source}")]
    Unreachable { peer: String, source: String },
    #[error("peer {peer} returned malformed response: {detail}")]
    Malformed { peer: String, detail: String },
}

/// Outbound peer wire protocol: broadcasting this delegate's own votes,
/// certificates, and blocks, plus pulling blocks by height during sync.
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn broadcast_block(&self, peers: &[String], block: &Block) -> Result<(), PeerClientError>;
    async fn broadcast_vote(&self, peers: &[String], vote: &Vote) -> Result<(), PeerClientError>;
    async fn broadcast_certificate(&self, peers: &[String], certificate: &Certificate) -> Result<(), PeerClientError>;
    /// Heartbeat liveness probe used by the proposer loop before its first tick.
    async fn heartbeat(&self, peer: &str) -> Result<(), PeerClientError>;
    /// Pull the block at `height` from `peer`, if it has one.
    async fn pull_block(&self, peer: &str, height: i64) -> Result<Option<Block>, PeerClientError>;
    async fn pull_header(&self, peer: &str, height: i64) -> Result<Option<Header>, PeerClientError>;
    /// Pull the quorum certificate for `hash` from `peer`, used by the sync
    /// loop to assemble a `(block, certificate)` pair for the next height.
    async fn pull_certificate(&self, peer: &str, hash: &[u8; 32]) -> Result<Option<Certificate>, PeerClientError>;
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("block production failed: {0}")]
    ProductionFailed(String),
}

/// Produces the opaque transaction payload, receipts, and roots for a new
/// block this delegate is about to propose. Entirely external — this crate
/// has no transaction pool or executor of its own.
#[async_trait]
pub trait BlockBuilder: Send + Sync {
    /// Returns `(transactions, receipts, state_root, tx_root)` for a block
    /// to be built on top of `parent`.
    async fn build_body(&self, parent: &Header) -> Result<(Vec<u8>, Vec<u8>, [u8; 32], [u8; 32]), BuildError>;
}
