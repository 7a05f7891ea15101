//! # Storage Module
//!
//! The data model for the chain this engine drives consensus over, plus the
//! persistence adapter contract.
//!
//! ```text
//! block.rs       — Header/Block structures, genesis, self-hash computation
//! persistence.rs — PersistenceAdapter trait + sled-backed implementation
//! ```
//!
//! ## Design Decisions
//!
//! 1. **BLAKE3 for header self-hashes.** Fast on every architecture that
//!    matters, comfortable security margin.
//!
//! 2. **Bincode for on-disk serialization.** Compact, fast, deterministic.
//!    JSON is reserved for the peer wire protocol and debugging.
//!
//! 3. **Opaque transaction bodies.** This crate is a consensus engine, not
//!    an execution engine — `transactions`/`receipts`/`state_root`/`tx_root`
//!    are produced and checked by an external validator oracle.

pub mod block;
pub mod persistence;

pub use block::{Block, Header};
pub use persistence::{PersistenceAdapter, PersistenceError, SledPersistence};
