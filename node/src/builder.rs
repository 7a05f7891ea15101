//! # Devnet Block Builder
//!
//! Supplies the opaque transaction payload for a block this node is about
//! to propose. This crate has no transaction pool or executor of its own —
//! the devnet implementation here always proposes an empty body, carrying
//! the parent's state root forward unchanged. A real deployment replaces
//! this with something that drains a mempool and runs a state transition.

use async_trait::async_trait;
use nova_dbft::consensus::traits::{BlockBuilder, BuildError};
use nova_dbft::crypto::hash::blake3_hash;
use nova_dbft::storage::block::Header;

pub struct EmptyBlockBuilder;

#[async_trait]
impl BlockBuilder for EmptyBlockBuilder {
    async fn build_body(&self, parent: &Header) -> Result<(Vec<u8>, Vec<u8>, [u8; 32], [u8; 32]), BuildError> {
        let transactions = Vec::new();
        let receipts = Vec::new();
        let state_root = parent.state_root;
        let tx_root = blake3_hash(&transactions);
        Ok((transactions, receipts, state_root, tx_root))
    }
}
