//! # Header & Block
//!
//! A block is the atomic unit of consensus: a header plus an opaque
//! transaction payload and receipts. The header's self-hash is the identity
//! the rest of the engine (block manager, vote aggregator, persistence) keys
//! everything off of.
//!
//! ## Hash Computation
//!
//! The header hash covers `height || parent_hash || timestamp_ms || miner ||
//! state_root || tx_root`. The signature is not part of the hash — it signs
//! the hash, not the other way around.
//!
//! ## Opaque payload
//!
//! `state_root` and `tx_root` are opaque to this crate: they are produced by
//! an external validator oracle from the block's transactions, not computed
//! here. Likewise `transactions` and `receipts` are carried as raw bytes —
//! this engine never deserializes or executes them.

use serde::{Deserialize, Serialize};

use crate::consensus::peer::Peer;
use crate::crypto::hash::blake3_hash_multi;
use crate::crypto::keys::{KeyError, NovaKeypair, NovaPublicKey, NovaSignature};

/// Essential chain-linkage metadata for a block.
///
/// Height is `i64` (not `u64`) to match the wire format of the original
/// delegate-roster protocol this engine replaces — height 0 is reserved for
/// genesis and heights increase strictly by one per commit thereafter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Block height. Strictly increasing from 1; 0 is genesis.
    pub height: i64,
    /// Hash of the parent header. All zeros for genesis.
    pub parent_hash: [u8; 32],
    /// Wall-clock time (milliseconds) at which the proposer packed this block.
    pub timestamp_ms: i64,
    /// The delegate that proposed this block.
    pub miner: Peer,
    /// State root after applying this block's transactions. Opaque — produced
    /// by the validator oracle, never computed by this crate.
    pub state_root: [u8; 32],
    /// Root of the transaction set. Opaque for the same reason as `state_root`.
    pub tx_root: [u8; 32],
    /// Self-hash, derived deterministically from the fields above.
    pub hash: [u8; 32],
    /// The proposer's signature over `hash`. Empty for genesis, which is
    /// agreed by construction rather than by proposer attestation.
    pub signature: NovaSignature,
}

impl Header {
    /// Recompute the self-hash from the header's fields.
    ///
    /// Used both to construct a fresh header and to check that a peer-sent
    /// header's declared `hash` matches its content.
    pub fn compute_hash(&self) -> [u8; 32] {
        compute_header_hash(
            self.height,
            &self.parent_hash,
            self.timestamp_ms,
            &self.miner,
            &self.state_root,
            &self.tx_root,
        )
    }

    /// `true` iff the stored `hash` matches the recomputed self-hash.
    pub fn hash_is_consistent(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Hex-encoded self-hash, the form used in the `vc:` persistence
    /// namespace and the peer wire protocol's `hash=<hex>` query parameters.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Sign `self.hash` with the proposer's keypair and attach the result.
    ///
    /// Called once by the proposer loop immediately after packing a new
    /// header, before the block is inserted into the block manager or
    /// broadcast. Genesis is never signed this way — see [`Block::genesis`].
    pub fn sign(&mut self, keypair: &NovaKeypair) {
        self.signature = keypair.sign(&self.hash);
    }

    /// Verify `signature` against `hash` using the miner's own public key.
    ///
    /// Used by `on_peer_block` to reject a header whose attached signature
    /// does not match the delegate it claims to be from, before the header
    /// ever reaches the validator oracle.
    pub fn verify_signature(&self) -> Result<bool, KeyError> {
        let public_key = self.miner.public_key()?;
        Ok(public_key.verify(&self.hash, &self.signature))
    }
}

/// Compute the BLAKE3 self-hash of a header from its constituent fields.
///
/// The hash covers `height || parent_hash || timestamp_ms || miner.account
/// || miner.address || state_root || tx_root`. The signature (carried
/// alongside the header in [`Block`], not inside it) is never part of the
/// hash — it signs the hash, not the other way around.
pub fn compute_header_hash(
    height: i64,
    parent_hash: &[u8; 32],
    timestamp_ms: i64,
    miner: &Peer,
    state_root: &[u8; 32],
    tx_root: &[u8; 32],
) -> [u8; 32] {
    blake3_hash_multi(&[
        &height.to_le_bytes(),
        parent_hash,
        &timestamp_ms.to_le_bytes(),
        miner.account.as_bytes(),
        miner.address.as_bytes(),
        state_root,
        tx_root,
    ])
}

/// A full block: header plus an opaque transaction payload and receipts.
///
/// `hash()` always equals `header.hash`. Transactions and receipts are
/// carried as raw bytes — decoding and executing them is the validator
/// oracle's job, not this crate's.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    /// Opaque, externally-encoded transaction payload.
    pub transactions: Vec<u8>,
    /// Opaque, externally-encoded receipts produced by executing `transactions`.
    pub receipts: Vec<u8>,
}

impl Block {
    /// Construct the genesis block (height 0) for a given roster.
    ///
    /// Genesis has no parent, a timestamp of 0, and is unsigned — there is
    /// no vote or certificate for it; every delegate starts from the same
    /// genesis by construction, not by agreement.
    pub fn genesis(genesis_proposer: Peer) -> Self {
        let height = 0;
        let parent_hash = [0u8; 32];
        let timestamp_ms = 0;
        let state_root = [0u8; 32];
        let tx_root = [0u8; 32];
        let hash = compute_header_hash(
            height,
            &parent_hash,
            timestamp_ms,
            &genesis_proposer,
            &state_root,
            &tx_root,
        );

        Block {
            header: Header {
                height,
                parent_hash,
                timestamp_ms,
                miner: genesis_proposer,
                state_root,
                tx_root,
                hash,
                signature: NovaSignature::empty(),
            },
            transactions: Vec::new(),
            receipts: Vec::new(),
        }
    }

    /// The block's identity hash — always equal to `header.hash`.
    pub fn hash(&self) -> [u8; 32] {
        self.header.hash
    }

    pub fn hash_hex(&self) -> String {
        self.header.hash_hex()
    }

    pub fn height(&self) -> i64 {
        self.header.height
    }
}
