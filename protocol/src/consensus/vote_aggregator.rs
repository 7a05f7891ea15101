//! # Vote Aggregator
//!
//! Collects votes per block hash and detects the instant the aggregated
//! count crosses quorum, sealing a [`Certificate`] exactly once per hash —
//! a second quorum-crossing insert (e.g. a retransmitted vote) must never
//! trigger a second broadcast.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::consensus::vote::{Certificate, Vote, VoteSet};

fn hash_key(hash: &[u8; 32]) -> String {
    hex::encode(hash)
}

/// Aggregates votes across block hashes and tracks which hashes have
/// already had their certificate sealed and broadcast.
#[derive(Default)]
pub struct VoteAggregator {
    sets: HashMap<String, VoteSet>,
    certified: HashSet<String>,
}

impl VoteAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vote_set(&self, hash: &[u8; 32]) -> Option<&VoteSet> {
        self.sets.get(&hash_key(hash))
    }

    pub fn count(&self, hash: &[u8; 32]) -> usize {
        self.sets.get(&hash_key(hash)).map(|s| s.approvals()).unwrap_or(0)
    }

    pub fn is_certified(&self, hash: &[u8; 32]) -> bool {
        self.certified.contains(&hash_key(hash))
    }

    /// Validate and insert a vote. Invalid votes (bad signature, or a
    /// `(chain_id, block_height)` mismatch against votes already recorded
    /// for this hash) are silently dropped.
    ///
    /// If this insertion causes the set to cross quorum for the first
    /// time, seal and return a `Certificate`; otherwise return `None`.
    /// Votes for an already-certified hash are still recorded (they may
    /// strengthen the certificate) but never re-trigger one.
    pub fn insert(&mut self, vote: Vote, roster_len: usize) -> Option<Certificate> {
        let public_key = match vote.voter.public_key() {
            Ok(key) => key,
            Err(_) => {
                warn!(voter = %vote.voter.account, "dropping vote: unrecoverable public key");
                return None;
            }
        };
        if !vote.verify_signature(&public_key) {
            warn!(voter = %vote.voter.account, "dropping vote: signature verification failed");
            return None;
        }

        let key = hash_key(&vote.block_hash);
        if let Some(existing) = self.sets.get(&key) {
            if let Some(prior) = existing.votes().first() {
                if prior.chain_id != vote.chain_id || prior.block_height != vote.block_height {
                    warn!(voter = %vote.voter.account, "dropping vote: chain_id/height mismatch for hash");
                    return None;
                }
            }
        }

        let chain_id = vote.chain_id;
        let height = vote.block_height;
        let hash = vote.block_hash;
        let already_certified = self.certified.contains(&key);

        let set = self.sets.entry(key.clone()).or_insert_with(VoteSet::new);
        set.insert(vote);

        if already_certified {
            return None;
        }

        if set.has_quorum(roster_len) {
            self.certified.insert(key);
            Some(Certificate::seal(chain_id, height, hash, set))
        } else {
            None
        }
    }

    /// Drop all aggregation state for `hash` — used once a block is
    /// committed and its vote-gathering phase is over.
    pub fn clear(&mut self, hash: &[u8; 32]) {
        let key = hash_key(hash);
        self.sets.remove(&key);
        self.certified.remove(&key);
    }
}
