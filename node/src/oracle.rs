//! # Devnet Validator Oracle
//!
//! The consensus engine never executes transactions — it asks an external
//! [`ValidatorOracle`] whether a proposed body is valid. This devnet
//! implementation checks only what the node itself can check without a real
//! execution layer: the header's self-hash is consistent and the proposer's
//! signature over that hash verifies. Wiring in a real transaction executor
//! means replacing this file, not the driver.

use async_trait::async_trait;
use nova_dbft::consensus::traits::{OracleError, ValidatorOracle};
use nova_dbft::storage::block::{Block, Header};

pub struct DevnetOracle;

#[async_trait]
impl ValidatorOracle for DevnetOracle {
    async fn validate_body(&self, _parent: &Header, block: &Block) -> Result<bool, OracleError> {
        if !block.header.hash_is_consistent() {
            return Ok(false);
        }
        match block.header.verify_signature() {
            Ok(valid) => Ok(valid),
            Err(e) => Err(OracleError::Unavailable(e.to_string())),
        }
    }
}
