//! # Consensus Configuration & Constants
//!
//! Every magic number the consensus engine depends on lives here. If you're
//! hardcoding a timing constant somewhere else in this crate, you're doing
//! it wrong.
//!
//! These values define the timing DNA of the chain. Changing `BLOCK_INTERVAL_MS`
//! after the delegate set has agreed on a genesis is somewhere between
//! "difficult" and "fork-inducing" — choose wisely during devnet.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::consensus::peer::Peer;
use crate::crypto::keys::NovaKeypair;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol magic bytes used in the peer wire format preamble.
pub const PROTOCOL_MAGIC: u32 = 0x414C4153; // "ALAS" — A Ledger for Autonomous Settlement

/// Wire protocol version for peer messages. Bump on breaking changes to the
/// HTTP wire protocol (independent of consensus-rule changes).
pub const WIRE_PROTOCOL_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 signing key length in bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length in bytes. Always 64.
pub const SIGNATURE_LENGTH: usize = 64;

/// BLAKE3 digest length in bytes. Used for block/header self-hashes.
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// Default block interval — the target wall-clock gap between consecutive
/// block timestamps. Two seconds is aggressive but achievable with a small
/// delegate set on commodity hardware.
pub const DEFAULT_BLOCK_INTERVAL_MS: u64 = 2_000;

/// Grace window multiplier within slot 0 of the round schedule: `3/2`.
/// `r < GRACE_WINDOW_NUMERATOR * I / GRACE_WINDOW_DENOMINATOR` is the
/// eligibility test for the immediate next proposer before the schedule
/// is considered to have rotated past them.
pub const GRACE_WINDOW_NUMERATOR: u64 = 3;
pub const GRACE_WINDOW_DENOMINATOR: u64 = 2;

/// Late-block threshold multiplier: `4/3`. A peer block whose observed
/// latency exceeds `LATE_THRESHOLD_NUMERATOR * I / LATE_THRESHOLD_DENOMINATOR`
/// is rejected as `ERR_LATE`.
pub const LATE_THRESHOLD_NUMERATOR: u64 = 4;
pub const LATE_THRESHOLD_DENOMINATOR: u64 = 3;

/// Proposer-loop tick fraction: wake every `I / PROPOSER_TICK_DIVISOR` ms.
pub const PROPOSER_TICK_DIVISOR: u64 = 4;

/// How often the proposer loop polls for delegate liveness before its
/// first tick, while waiting for more than half the roster to be reachable.
pub const LIVENESS_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default peer-client request timeout.
pub const DEFAULT_PEER_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Sync loop: number of consecutive pull failures before falling back to a
/// full-interval delay instead of exponential backoff.
pub const SYNC_MAX_BACKOFF_FAILURES: u32 = 3;

// ---------------------------------------------------------------------------
// Resource Discipline
// ---------------------------------------------------------------------------

/// Block Manager pruning window: entries for heights below
/// `last_committed - PRUNE_WINDOW` are dropped.
pub const PRUNE_WINDOW: i64 = 128;

// ---------------------------------------------------------------------------
// Network Parameters
// ---------------------------------------------------------------------------

/// Default port for the peer wire protocol / REST API.
pub const DEFAULT_RPC_PORT: u16 = 9741;

/// Default port for the Prometheus metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9742;

// ---------------------------------------------------------------------------
// ConsensusConfig
// ---------------------------------------------------------------------------

/// Process-wide configuration consumed by the consensus driver and its loops.
///
/// Deserializable from the node binary's TOML config file; every field has
/// a sane devnet default via [`ConsensusConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsensusConfig {
    /// Identifier of the chain this engine drives. Kept separate from the
    /// genesis hash so multi-chain deployments can share code paths.
    pub chain_id: i64,

    /// Block interval in milliseconds. The single most consequential
    /// tunable in the whole engine — every timing derivation (grace window,
    /// late threshold, proposer tick) scales off this.
    pub block_interval_ms: u64,
}

impl ConsensusConfig {
    /// `4/3 * I` — the late-block threshold, in milliseconds.
    pub fn late_threshold_ms(&self) -> u64 {
        self.block_interval_ms * LATE_THRESHOLD_NUMERATOR / LATE_THRESHOLD_DENOMINATOR
    }

    /// `3/2 * I` — the slot-0 grace window, in milliseconds.
    pub fn grace_window_ms(&self) -> u64 {
        self.block_interval_ms * GRACE_WINDOW_NUMERATOR / GRACE_WINDOW_DENOMINATOR
    }

    /// `I / 4` — the proposer loop's tick interval.
    pub fn proposer_tick(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms / PROPOSER_TICK_DIVISOR)
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            block_interval_ms: DEFAULT_BLOCK_INTERVAL_MS,
        }
    }
}

// ---------------------------------------------------------------------------
// NodeConfig
// ---------------------------------------------------------------------------

/// One entry in the fixed delegate roster, as written in the node's TOML
/// config file: an account (hex Ed25519 public key) and a network address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegateEntry {
    pub account: String,
    pub address: String,
}

/// This node's own identity: account, address, and hex-encoded private key.
///
/// The private key never leaves this struct's scope beyond constructing a
/// [`NovaKeypair`] at startup — it is not `Debug`-printed anywhere that
/// would leak it (see the `skip` on the custom `Debug` impl below).
#[derive(Clone, Serialize, Deserialize)]
pub struct ThisNode {
    pub account: String,
    pub address: String,
    pub private_key: String,
}

impl std::fmt::Debug for ThisNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThisNode")
            .field("account", &self.account)
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl ThisNode {
    /// Reconstruct this node's keypair from its configured private key.
    pub fn keypair(&self) -> Result<NovaKeypair, crate::crypto::keys::KeyError> {
        NovaKeypair::from_hex(&self.private_key)
    }
}

/// Participation mode for this node.
///
/// `Adaptive` is resolved once at startup (see [`NodeConfig::resolved_mode`])
/// to either `Delegate` or `Full` depending on whether this node's
/// configured private key actually derives the account it claims, and that
/// account is a member of `delegate_set`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Full node: follows the chain via sync, never proposes or votes.
    Full,
    /// Delegate: runs the proposer and vote-casting paths.
    Delegate,
    /// Resolved to `Delegate` or `Full` at startup, see [`NodeConfig::resolved_mode`].
    Adaptive,
}

/// A pre-funded account minted into the genesis block on an empty database.
/// Consumed once, by the node binary's genesis bootstrap path — opaque to
/// the consensus engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub account: String,
    pub balance: u64,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Full node-binary configuration, loaded from a TOML file and overridable
/// via `clap`/environment at the CLI layer (see `node/src/cli.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: i64,
    /// Block interval in *nanoseconds*, as carried over the wire protocol's
    /// configuration surface. Converted to milliseconds for
    /// [`ConsensusConfig`] via [`NodeConfig::consensus_config`].
    pub block_interval_ns: u64,
    pub delegate_set: Vec<DelegateEntry>,
    pub this_node: ThisNode,
    #[serde(default = "default_mode")]
    pub mode: NodeMode,
    #[serde(default)]
    pub genesis_accounts: Vec<GenesisAccount>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    #[serde(default = "default_rpc_port")]
    pub p2p_port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_chain_id() -> i64 {
    1
}

fn default_mode() -> NodeMode {
    NodeMode::Adaptive
}

fn default_rpc_port() -> u16 {
    DEFAULT_RPC_PORT
}

fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}

impl NodeConfig {
    /// Derive the [`ConsensusConfig`] the driver actually runs on.
    pub fn consensus_config(&self) -> ConsensusConfig {
        ConsensusConfig {
            chain_id: self.chain_id,
            block_interval_ms: (self.block_interval_ns / 1_000_000).max(1),
        }
    }

    /// The fixed delegate roster as [`Peer`] values, in configured order.
    pub fn delegate_roster(&self) -> Vec<Peer> {
        self.delegate_set
            .iter()
            .map(|d| Peer::new(d.account.clone(), d.address.clone()))
            .collect()
    }

    /// This node's own [`Peer`] identity.
    pub fn self_peer(&self) -> Peer {
        Peer::new(self.this_node.account.clone(), self.this_node.address.clone())
    }

    /// Resolve `Adaptive` to `Delegate` or `Full`.
    ///
    /// `Adaptive` becomes `Delegate` iff `this_node.account` both appears in
    /// `delegate_set` *and* matches the account actually derivable from
    /// `this_node.private_key` — a node cannot claim a delegate seat with a
    /// key that doesn't back it. Any other mode passes through unchanged.
    pub fn resolved_mode(&self) -> NodeMode {
        match self.mode {
            NodeMode::Adaptive => {
                let claims_seat = self.delegate_set.iter().any(|d| d.account == self.this_node.account);
                let key_backs_claim = self
                    .this_node
                    .keypair()
                    .map(|kp| kp.public_key_hex() == self.this_node.account)
                    .unwrap_or(false);
                if claims_seat && key_backs_claim {
                    NodeMode::Delegate
                } else {
                    NodeMode::Full
                }
            }
            other => other,
        }
    }
}
