//! # Vote & Vote Set
//!
//! A `Vote` is a delegate's signed approval of a specific block. A
//! `VoteSet` collects votes for a single block hash and knows when it has
//! crossed quorum — at that point it can be sealed into a certificate and
//! broadcast to the roster as commit evidence.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::consensus::peer::Peer;
use crate::crypto::hash::blake3_hash_multi;
use crate::crypto::keys::{NovaPublicKey, NovaSignature};
use crate::crypto::signatures;

/// A single delegate's vote on a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub chain_id: i64,
    pub block_height: i64,
    pub block_hash: [u8; 32],
    /// `true` for approval, `false` for explicit rejection. Only approvals
    /// count toward quorum; rejections are recorded but never aggregated.
    pub verdict: bool,
    pub voter: Peer,
    pub signature: NovaSignature,
}

impl Vote {
    /// The bytes a voter signs: `chain_id || block_height || block_hash || verdict`.
    pub fn signing_bytes(chain_id: i64, block_height: i64, block_hash: &[u8; 32], verdict: bool) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 8 + 32 + 1);
        buf.extend_from_slice(&chain_id.to_le_bytes());
        buf.extend_from_slice(&block_height.to_le_bytes());
        buf.extend_from_slice(block_hash);
        buf.push(verdict as u8);
        buf
    }

    /// Verify this vote's signature against its claimed voter.
    pub fn verify_signature(&self, voter_key: &NovaPublicKey) -> bool {
        let bytes = Self::signing_bytes(self.chain_id, self.block_height, &self.block_hash, self.verdict);
        signatures::verify(voter_key, &bytes, &self.signature)
    }
}

/// The set of votes collected so far for one block hash.
///
/// Votes are deduplicated by voter account: a second vote from the same
/// delegate for the same block replaces, never duplicates, their first.
/// Quorum is `count(approvals) > roster_len / 2` (strictly more than half —
/// not the 2/3+1 threshold this crate's ancestor used for PBFT-style
/// finality).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VoteSet {
    votes: Vec<Vote>,
}

impl VoteSet {
    pub fn new() -> Self {
        Self { votes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn approvals(&self) -> usize {
        self.votes.iter().filter(|v| v.verdict).count()
    }

    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    /// Insert a vote, replacing any prior vote from the same voter.
    ///
    /// Returns `true` if this is the first vote recorded for this voter
    /// (used by the aggregator to decide whether a quorum check is needed).
    pub fn insert(&mut self, vote: Vote) -> bool {
        if let Some(existing) = self.votes.iter_mut().find(|v| v.voter == vote.voter) {
            *existing = vote;
            false
        } else {
            self.votes.push(vote);
            true
        }
    }

    /// `true` once approvals strictly exceed half the roster.
    pub fn has_quorum(&self, roster_len: usize) -> bool {
        self.approvals() > roster_len / 2
    }
}

/// A quorum certificate: the sealed evidence that a block reached quorum.
///
/// Certificates are self-verifying — any peer can check `votes.len() >
/// roster_len / 2 + 1` plus each signature independently, without trusting
/// the certificate's originator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Certificate {
    pub chain_id: i64,
    pub block_height: i64,
    pub block_hash: [u8; 32],
    pub votes: Vec<Vote>,
}

impl Certificate {
    /// Seal a `VoteSet` that has already reached quorum into a certificate.
    pub fn seal(chain_id: i64, block_height: i64, block_hash: [u8; 32], vote_set: &VoteSet) -> Self {
        Certificate {
            chain_id,
            block_height,
            block_hash,
            votes: vote_set.votes().iter().filter(|v| v.verdict).cloned().collect(),
        }
    }

    /// `true` iff this certificate actually carries more than half the
    /// roster's worth of approvals for the height/hash it claims.
    ///
    /// This alone is **not** sufficient to trust a certificate received from
    /// a peer — it never looks at a signature, never checks `chain_id`, and
    /// never rejects a repeated voter padding out the count. Untrusted
    /// certificates (peer `voteResult` bodies, sync-loop pulls) must go
    /// through [`Certificate::verify_all`] instead.
    pub fn has_quorum(&self, roster_len: usize) -> bool {
        self.votes.len() > roster_len / 2
            && self
                .votes
                .iter()
                .all(|v| v.verdict && v.block_height == self.block_height && v.block_hash == self.block_hash)
    }

    /// Full soundness check for a certificate arriving from an untrusted
    /// peer: every vote's signature verifies against its claimed voter,
    /// voters are pairwise distinct, every vote agrees with this
    /// certificate's own `(chain_id, block_height, block_hash)`, and the
    /// distinct-voter count exceeds `roster_len / 2`.
    ///
    /// Matches SPEC_FULL §4.4/§8's certificate soundness invariant:
    /// `validate(certificate) == true ⇒ |certificate| > N/2 ∧ all
    /// signatures verify ∧ all entries share (chain_id, height, hash)`.
    pub fn verify_all(&self, expected_chain_id: i64, roster_len: usize) -> bool {
        if self.votes.is_empty() {
            return false;
        }
        if self.chain_id != expected_chain_id {
            return false;
        }

        let mut seen_voters = HashSet::with_capacity(self.votes.len());
        for vote in &self.votes {
            if !vote.verdict
                || vote.chain_id != self.chain_id
                || vote.block_height != self.block_height
                || vote.block_hash != self.block_hash
            {
                return false;
            }
            if !seen_voters.insert(vote.voter.account.as_str()) {
                return false;
            }
            let public_key = match vote.voter.public_key() {
                Ok(key) => key,
                Err(_) => return false,
            };
            if !vote.verify_signature(&public_key) {
                return false;
            }
        }

        seen_voters.len() > roster_len / 2
    }

    /// A stable identity hash for deduplicating idempotent rebroadcasts of
    /// the "same" certificate (same height/hash, same voter set).
    pub fn identity_hash(&self) -> [u8; 32] {
        let mut accounts: Vec<&str> = self.votes.iter().map(|v| v.voter.account.as_str()).collect();
        accounts.sort_unstable();
        let parts: Vec<&[u8]> = std::iter::once(self.block_hash.as_slice())
            .chain(accounts.iter().map(|a| a.as_bytes()))
            .collect();
        blake3_hash_multi(&parts)
    }
}
