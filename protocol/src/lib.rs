// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # NOVA dBFT — Core Library
//!
//! A delegated Byzantine-fault-tolerant consensus engine for a linear,
//! append-only chain across a fixed roster of delegates. Given the roster,
//! a block interval, and an external block-production/validation capability,
//! this crate decides who proposes each block, collects and verifies peer
//! votes, assembles quorum certificates, and commits blocks to storage in
//! strict height order.
//!
//! ## Architecture
//!
//! - **crypto** — Ed25519 signing and BLAKE3/SHA-256 hashing. Don't roll your own.
//! - **config** — Consensus constants and tunables.
//! - **consensus** — The engine itself: round scheduling, block lifecycle,
//!   vote aggregation, the driver, and the proposer/sync loops.
//! - **storage** — Block/header data model plus the persistence adapter
//!   contract (and a `sled`-backed implementation of it).
//!
//! ## Design Philosophy
//!
//! 1. Correctness over performance (but we're still fast).
//! 2. No unsafe code in crypto paths — we sleep at night.
//! 3. One coarse-grained lock over consensus state. Fine-grained locking
//!    here buys nothing but ordering bugs.
//! 4. If it touches the chain, it has tests. Plural.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod storage;
