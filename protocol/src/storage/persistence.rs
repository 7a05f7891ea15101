//! # Persistence Adapter
//!
//! The consensus driver never touches `sled` directly — it talks to the
//! [`PersistenceAdapter`] trait. [`SledPersistence`] is the concrete,
//! embedded-database implementation the node binary wires in.
//!
//! ## Tree Layout
//!
//! | Tree   | Key                 | Value                         |
//! |--------|---------------------|--------------------------------|
//! | `lh`   | `b"last"` (fixed)   | `bincode(Header)` — chain tip  |
//! | `hh`   | `height` (8B BE)    | `bincode(Header)`               |
//! | `bh`   | `height` (8B BE)    | `bincode(Block)`                 |
//! | `hx`   | `hash` (32B)        | `height` (8B BE) — reverse index |
//! | `vc`   | `height` (8B BE)    | `bincode(Certificate)`           |
//!
//! Heights are stored as big-endian so sled's lexicographic ordering matches
//! numeric ordering. A commit writes `hh`, `bh`, `hx`, `vc`, and `lh` as a
//! single atomic batch per tree — a crash mid-commit never leaves a height
//! with a block but no header, or a certificate with no block.

use std::path::Path;

use async_trait::async_trait;
use sled::{Batch, Db, Tree};
use thiserror::Error;

use crate::consensus::vote::Certificate;
use crate::storage::block::{Block, Header};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

fn height_key(height: i64) -> [u8; 8] {
    height.to_be_bytes()
}

fn decode<T: serde::de::DeserializeOwned>(bytes: sled::IVec) -> Result<T, PersistenceError> {
    bincode::deserialize(&bytes).map_err(|e| PersistenceError::Serialization(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, PersistenceError> {
    bincode::serialize(value).map_err(|e| PersistenceError::Serialization(e.to_string()))
}

/// The durable-storage contract the consensus driver depends on.
///
/// Every method is `async` so a future non-embedded backend (a remote KV
/// store, say) can be swapped in without touching the driver.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    async fn last_header(&self) -> Result<Option<Header>, PersistenceError>;
    async fn header_by_height(&self, height: i64) -> Result<Option<Header>, PersistenceError>;
    async fn header_by_hash(&self, hash: &[u8; 32]) -> Result<Option<Header>, PersistenceError>;
    async fn block_by_height(&self, height: i64) -> Result<Option<Block>, PersistenceError>;
    async fn certificate_by_height(&self, height: i64) -> Result<Option<Certificate>, PersistenceError>;

    /// Atomically persist a committed block, its certificate, and advance
    /// the chain tip. Must be all-or-nothing.
    async fn commit(&self, block: &Block, certificate: &Certificate) -> Result<(), PersistenceError>;
}

/// `sled`-backed [`PersistenceAdapter`].
#[derive(Clone)]
pub struct SledPersistence {
    db: Db,
    last_header: Tree,
    headers_by_height: Tree,
    blocks_by_height: Tree,
    height_by_hash: Tree,
    certificates: Tree,
}

const LAST_HEADER_KEY: &[u8] = b"last";

impl SledPersistence {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory database that vanishes when dropped — used in tests.
    pub fn open_temporary() -> Result<Self, PersistenceError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, PersistenceError> {
        Ok(Self {
            last_header: db.open_tree("lh")?,
            headers_by_height: db.open_tree("hh")?,
            blocks_by_height: db.open_tree("bh")?,
            height_by_hash: db.open_tree("hx")?,
            certificates: db.open_tree("vc")?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), PersistenceError> {
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceAdapter for SledPersistence {
    async fn last_header(&self) -> Result<Option<Header>, PersistenceError> {
        match self.last_header.get(LAST_HEADER_KEY)? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    async fn header_by_height(&self, height: i64) -> Result<Option<Header>, PersistenceError> {
        match self.headers_by_height.get(height_key(height))? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    async fn header_by_hash(&self, hash: &[u8; 32]) -> Result<Option<Header>, PersistenceError> {
        match self.height_by_hash.get(hash)? {
            Some(height_bytes) => {
                let height = i64::from_be_bytes(
                    height_bytes
                        .as_ref()
                        .try_into()
                        .map_err(|_| PersistenceError::Serialization("invalid height bytes".into()))?,
                );
                self.header_by_height(height).await
            }
            None => Ok(None),
        }
    }

    async fn block_by_height(&self, height: i64) -> Result<Option<Block>, PersistenceError> {
        match self.blocks_by_height.get(height_key(height))? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    async fn certificate_by_height(&self, height: i64) -> Result<Option<Certificate>, PersistenceError> {
        match self.certificates.get(height_key(height))? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    async fn commit(&self, block: &Block, certificate: &Certificate) -> Result<(), PersistenceError> {
        let key = height_key(block.header.height);

        let mut header_batch = Batch::default();
        header_batch.insert(&key, encode(&block.header)?);
        self.headers_by_height.apply_batch(header_batch)?;

        let mut block_batch = Batch::default();
        block_batch.insert(&key, encode(block)?);
        self.blocks_by_height.apply_batch(block_batch)?;

        self.height_by_hash.insert(&block.header.hash, &key)?;
        self.certificates.insert(&key, encode(certificate)?)?;
        self.last_header.insert(LAST_HEADER_KEY, encode(&block.header)?)?;

        self.db.flush()?;
        Ok(())
    }
}
