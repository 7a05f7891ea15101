//! # Block Manager
//!
//! Tracks the lifecycle status of every block this delegate has seen, keyed
//! by header hash, plus per-height vote-emission timestamps and the
//! proposer loop's own packing timestamps. Entries are pruned once their
//! height falls far enough behind the committed tip.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PRUNE_WINDOW;
use crate::storage::block::Block;

/// Lifecycle status of a block as observed by this delegate.
///
/// Transitions are monotone: once a block reaches `Committed` or any
/// `Err*` variant, it is terminal and will never transition again.
///
/// ```text
/// Unknown -> Seen -> Valid -> Voted -> Committed
///               \-> ErrBody
///               \-> ErrLate
///               \-> ErrProposer
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// No record of this hash at all (the default for an unseen query).
    Unknown,
    /// Header/block received, not yet validated.
    Seen,
    /// Packed locally by this delegate's own proposer loop, awaiting a
    /// delayed re-vote check (peer-received blocks skip straight past this
    /// to `Voted`/`ErrBody`/`ErrLate`/`ErrProposer`).
    Valid,
    /// This delegate has cast its own vote for this block.
    Voted,
    /// A quorum certificate was assembled and the block was committed.
    Committed,
    /// Body failed the external validator oracle's check.
    ErrBody,
    /// Arrived later than the late-block threshold allows.
    ErrLate,
    /// Proposed by a delegate that was not eligible at its timestamp.
    ErrProposer,
}

impl Status {
    /// `true` for `Committed` or any `Err*` status — no further transition
    /// is permitted once a block reaches one of these.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Committed | Status::ErrBody | Status::ErrLate | Status::ErrProposer
        )
    }
}

#[derive(Debug, Error)]
pub enum BlockManagerError {
    #[error("block {0} already has terminal status {1:?}, cannot transition to {2:?}")]
    AlreadyTerminal(String, Status, Status),
}

fn hash_key(hash: &[u8; 32]) -> String {
    hex::encode(hash)
}

/// Per-hash status and per-height bookkeeping for blocks this delegate has
/// observed.
///
/// Holds the full `Block` bodies only until they are pruned; status entries
/// for pruned heights are dropped at the same time.
#[derive(Default)]
pub struct BlockManager {
    status: HashMap<String, Status>,
    blocks: HashMap<String, Block>,
    /// height -> wall-clock ms this delegate last emitted its own vote for
    /// that height. Enforces at most one vote per interval per height.
    vote_time: HashMap<i64, i64>,
    /// height -> wall-clock ms the proposer loop last packed (or attempted
    /// to pack) that height's slot.
    height_slot: HashMap<i64, i64>,
    last_committed_height: i64,
}

impl BlockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_of(&self, hash: &[u8; 32]) -> Status {
        self.status.get(&hash_key(hash)).copied().unwrap_or(Status::Unknown)
    }

    pub fn block(&self, hash: &[u8; 32]) -> Option<&Block> {
        self.blocks.get(&hash_key(hash))
    }

    pub fn last_committed_height(&self) -> i64 {
        self.last_committed_height
    }

    /// Last wall-clock time (ms) this delegate emitted its own vote for `height`.
    pub fn vote_time(&self, height: i64) -> Option<i64> {
        self.vote_time.get(&height).copied()
    }

    pub fn set_vote_time(&mut self, height: i64, ms: i64) {
        self.vote_time.insert(height, ms);
    }

    /// `true` iff no prior `set_height_slot(height, ...)` has landed within
    /// the last `interval_ms` — the proposer loop's "have I already packed
    /// this slot" guard.
    pub fn check_height_interval(&self, height: i64, now_ms: i64, interval_ms: u64) -> bool {
        match self.height_slot.get(&height) {
            Some(last) => now_ms - last >= interval_ms as i64,
            None => true,
        }
    }

    pub fn set_height_slot(&mut self, height: i64, ms: i64) {
        self.height_slot.insert(height, ms);
    }

    /// Record a freshly received (or locally built) block, idempotently.
    /// An entry already present for this hash is left untouched — first
    /// observation wins.
    pub fn insert(&mut self, block: Block) {
        let key = hash_key(&block.hash());
        if !self.status.contains_key(&key) {
            self.status.insert(key.clone(), Status::Seen);
            self.blocks.insert(key, block);
        }
    }

    /// Transition a hash to a new status. Rejects any transition out of a
    /// terminal status.
    pub fn set_status(&mut self, hash: &[u8; 32], next: Status) -> Result<(), BlockManagerError> {
        let key = hash_key(hash);
        let current = self.status.get(&key).copied().unwrap_or(Status::Unknown);
        if current.is_terminal() {
            return Err(BlockManagerError::AlreadyTerminal(key, current, next));
        }
        self.status.insert(key, next);
        Ok(())
    }

    /// Mark `hash` committed and advance the committed-height watermark,
    /// then prune anything far enough behind it.
    pub fn mark_committed(&mut self, hash: &[u8; 32], height: i64) -> Result<(), BlockManagerError> {
        self.set_status(hash, Status::Committed)?;
        if height > self.last_committed_height {
            self.last_committed_height = height;
        }
        self.prune();
        Ok(())
    }

    fn prune(&mut self) {
        let floor = self.last_committed_height - PRUNE_WINDOW;
        if floor <= 0 {
            return;
        }
        let stale_hashes: Vec<String> = self
            .blocks
            .iter()
            .filter(|(_, b)| b.header.height < floor)
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale_hashes {
            self.status.remove(&key);
            self.blocks.remove(&key);
        }
        self.vote_time.retain(|h, _| *h >= floor);
        self.height_slot.retain(|h, _| *h >= floor);
    }
}
