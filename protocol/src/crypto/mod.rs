//! # Cryptographic Primitives
//!
//! Every signing operation and every hash the consensus engine relies on
//! flows through here.
//!
//! We deliberately chose boring, well-audited cryptography:
//!
//! - **Ed25519** for signatures — fast, deterministic, and nobody has broken it.
//! - **BLAKE3** for hashing — block and header self-hashes, because we live
//!   in the future.
//! - **SHA-256** kept for interop with external components that expect it.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations. If you're tempted to optimize these functions, please
//! reconsider. Then reconsider again. Then go read about timing attacks
//! and come back when you've lost the urge.

pub mod hash;
pub mod keys;
pub mod signatures;

// Re-export the things people actually need so they don't have to memorize
// our module hierarchy.
pub use hash::{blake3_hash, blake3_hash_vec, sha256};
pub use keys::{KeyError, NovaKeypair, NovaPublicKey, NovaSignature};
pub use signatures::{sign, verify, SignatureError};
