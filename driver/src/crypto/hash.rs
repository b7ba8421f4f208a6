//! # Hashing Utilities
//!
//! Two hash functions, each with one job:
//!
//! - **SHA3-256** — transaction IDs and the per-input signing digest. The
//!   server recomputes both, so the choice is not ours to make.
//! - **SHA-256** — crypto-condition fingerprints (`ni:///sha-256;...`).
//!
//! Incremental hashing is exposed through [`Sha3Hasher`] because the signing
//! digest is built from the canonical transaction followed by the
//! coordinates of the output being spent.

use sha2::Sha256;
use sha3::{Digest, Sha3_256};

/// Compute the SHA3-256 digest of `data`.
///
/// # Example
///
/// ```
/// use resdb_driver::crypto::sha3_256;
///
/// let digest = sha3_256(b"resilientdb");
/// assert_eq!(digest.len(), 32);
/// ```
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA3-256 as a lower-case hex string. This is the transaction ID format.
pub fn sha3_256_hex(data: &[u8]) -> String {
    hex::encode(sha3_256(data))
}

/// Compute the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Incremental SHA3-256.
///
/// Feeding parts one at a time yields the same digest as hashing their
/// concatenation, which is exactly what the input signing scheme needs.
#[derive(Clone, Default)]
pub struct Sha3Hasher {
    inner: Sha3_256,
}

impl Sha3Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb more bytes.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Consume the hasher and return the 32-byte digest.
    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha3_256_empty_vector() {
        assert_eq!(
            sha3_256_hex(b""),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn sha3_256_abc_vector() {
        assert_eq!(
            sha3_256_hex(b"abc"),
            "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532"
        );
    }

    #[test]
    fn sha256_empty_vector() {
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(sha256(b"").to_vec(), expected);
    }

    #[test]
    fn hex_is_lower_case() {
        let digest = sha3_256_hex(b"ResilientDB");
        assert_eq!(digest.len(), 64);
        assert!(digest
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn incremental_matches_concatenation() {
        let mut hasher = Sha3Hasher::new();
        hasher.update(b"{\"id\":null}").update(b"abc").update(b"0");
        assert_eq!(hasher.finalize(), sha3_256(b"{\"id\":null}abc0"));
    }
}
