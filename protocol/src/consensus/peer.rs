//! # Peer & Round
//!
//! The delegate roster and the round-scheduling state that decides, at any
//! instant, which delegate is eligible to propose the next block.

use serde::{Deserialize, Serialize};

use crate::crypto::keys::{KeyError, NovaPublicKey};

/// A single delegate in the fixed roster this engine drives consensus over.
///
/// `account` is the hex encoding of the delegate's Ed25519 public key —
/// both its stable identifier and, via [`Peer::public_key`], the key that
/// verifies its votes and headers. Equality and identity are by `account`
/// alone — two `Peer` values with the same account but different addresses
/// are the same delegate observed at different network locations (e.g.
/// after a reconnect).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Peer {
    pub account: String,
    /// Current `host:port` this delegate is reachable at.
    pub address: String,
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.account == other.account
    }
}

impl Eq for Peer {}

impl Peer {
    pub fn new(account: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            address: address.into(),
        }
    }

    /// Recover this delegate's Ed25519 public key from its account string.
    pub fn public_key(&self) -> Result<NovaPublicKey, KeyError> {
        NovaPublicKey::from_hex(&self.account).map_err(|_| KeyError::InvalidPublicKey)
    }
}

/// Round-scheduling state: the fixed peer roster, the index of the delegate
/// that proposed most recently, and a heartbeat-maintained "round time"
/// used only to decide whether the rightful proposer is still on time.
///
/// `Round` does not know about blocks or votes. Eligibility itself is
/// computed from `current_index` plus two externally supplied timestamps —
/// the candidate pack time and the chain tip's own timestamp — never from
/// `last_pack_time_ms`, which exists solely for the heartbeat-driven
/// "should I defer" check the proposer loop runs before consulting the
/// schedule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Round {
    /// The fixed delegate roster, in a stable, chain-wide agreed order.
    pub peers: Vec<Peer>,
    /// Index into `peers` of the delegate that packed the most recent block.
    pub current_index: usize,
    /// Wall-clock time (ms) of the last heartbeat or pack observed for the
    /// current slot. Maintained via [`Round::set_time`]/[`Round::get_time`].
    pub last_pack_time_ms: i64,
}

impl Round {
    pub fn new(peers: Vec<Peer>) -> Self {
        Self {
            peers,
            current_index: 0,
            last_pack_time_ms: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Quorum threshold for this roster: strictly more than half.
    pub fn quorum(&self) -> usize {
        self.peers.len() / 2 + 1
    }

    pub fn get_time(&self) -> i64 {
        self.last_pack_time_ms
    }

    pub fn set_time(&mut self, ms: i64) {
        self.last_pack_time_ms = ms;
    }

    /// The delegate eligible to propose at `pack_time_ms`, given the chain
    /// tip's own `last_block_time_ms`.
    ///
    /// If `last_block_time_ms == 0` (no block has ever been committed —
    /// genesis), the only eligible proposer is `peers[0]`.
    ///
    /// Otherwise let `Δ = pack_time_ms - last_block_time_ms`, `n = Δ / I`,
    /// `r = Δ mod I`:
    /// - `n == 0`: the rightful proposer is `peers[(current_index + 1) mod N]`
    ///   provided `r < 3·I/2` — the slot-0 grace window. Since `r < I <
    ///   3·I/2` always holds when `n == 0`, this branch always resolves to
    ///   the immediate successor; the grace window only matters for the
    ///   boundary analysis in the late-block / proposer-loop timing checks
    ///   elsewhere, not here.
    /// - `n >= 1`: `n` slots were missed. The eligible proposer is
    ///   `peers[(current_index + n + 1) mod N]`.
    pub fn proposer_for(&self, pack_time_ms: i64, last_block_time_ms: i64, block_interval_ms: u64) -> Option<&Peer> {
        if self.peers.is_empty() {
            return None;
        }
        if last_block_time_ms == 0 {
            return self.peers.first();
        }
        let interval = block_interval_ms.max(1) as i64;
        let delta = pack_time_ms - last_block_time_ms;
        let n = delta.div_euclid(interval);
        let remainder = delta.rem_euclid(interval);
        let offset = if n == 0 {
            if remainder < interval * 3 / 2 {
                1
            } else {
                return None;
            }
        } else {
            n + 1
        };
        let idx = (self.current_index as i64 + offset).rem_euclid(self.peers.len() as i64) as usize;
        self.peers.get(idx)
    }

    /// `true` iff `candidate` is the eligible proposer given the two timestamps.
    pub fn is_eligible(&self, pack_time_ms: i64, last_block_time_ms: i64, block_interval_ms: u64, candidate: &Peer) -> bool {
        self.proposer_for(pack_time_ms, last_block_time_ms, block_interval_ms)
            .map(|p| p == candidate)
            .unwrap_or(false)
    }

    /// Record that `proposer` packed the most recent block, advancing
    /// `current_index` to their roster position.
    ///
    /// Returns `false` (and leaves the round unchanged) if `proposer` is not
    /// a member of this roster.
    pub fn update_index(&mut self, proposer: &Peer) -> bool {
        match self.peers.iter().position(|p| p == proposer) {
            Some(idx) => {
                self.current_index = idx;
                true
            }
            None => false,
        }
    }
}
