//! # Cryptographic Primitives
//!
//! Everything the driver hashes or signs flows through here.
//!
//! - **Ed25519** for signatures, with keys exchanged as base58 strings the
//!   way the ledger server expects them.
//! - **SHA3-256** for transaction IDs and signing digests.
//! - **SHA-256** for crypto-condition fingerprints, because the
//!   crypto-conditions format is defined in terms of it.
//!
//! Nothing here is hand-rolled: the primitives come from `ed25519-dalek`,
//! `sha2` and `sha3`. This module only pins down encodings.

pub mod hash;
pub mod keys;

pub use hash::{sha256, sha3_256, sha3_256_hex};
pub use keys::{generate_keypair, CryptoKeypair, KeyError, PrivateKey, PublicKey};
