//! # Key Management
//!
//! Ed25519 keys in the base58 encoding the ledger uses for every
//! `public_key`, `owners_before` entry and private key handed to
//! [`fulfill`](crate::transaction::fulfill).
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (thanks, ed25519-dalek).
//! - Key generation uses `OsRng`.
//! - Key bytes are never logged, and [`PrivateKey`]'s `Debug` prints only
//!   the public half.
//! - The driver never persists private keys. Callers own them.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while decoding keys.
///
/// Vague on purpose: the message never echoes key material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid private key: not a 32-byte base58 string")]
    InvalidPrivateKey,

    #[error("invalid public key `{0}`: not a 32-byte base58 Ed25519 point")]
    InvalidPublicKey(String),
}

/// A base58 Ed25519 keypair as returned by [`generate_keypair`].
///
/// Mirrors the `{private_key, public_key}` pair the ledger tooling passes
/// around. Treat the private half accordingly.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoKeypair {
    pub private_key: String,
    pub public_key: String,
}

impl fmt::Debug for CryptoKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CryptoKeypair(pub={})", self.public_key)
    }
}

/// Generate a fresh keypair from the OS RNG, base58 encoded.
///
/// ```
/// use resdb_driver::crypto::generate_keypair;
///
/// let alice = generate_keypair();
/// assert!(alice.public_key.len() >= 32);
/// ```
pub fn generate_keypair() -> CryptoKeypair {
    let private_key = PrivateKey::generate();
    CryptoKeypair {
        public_key: private_key.public_key().to_base58(),
        private_key: private_key.to_base58(),
    }
}

// ---------------------------------------------------------------------------
// PrivateKey
// ---------------------------------------------------------------------------

/// An Ed25519 signing key.
pub struct PrivateKey {
    signing_key: SigningKey,
}

impl PrivateKey {
    /// Generate a new key from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Construct a key deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Decode a base58 private key.
    pub fn from_base58(encoded: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| KeyError::InvalidPrivateKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Base58 encoding of the secret seed.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.signing_key.to_bytes()).into_string()
    }

    /// The matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign `message`. Ed25519 is deterministic, so the same key and message
    /// always produce the same 64 bytes.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(pub={})", self.public_key().to_base58())
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// An Ed25519 verifying key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey {
    bytes: [u8; 32],
}

impl PublicKey {
    /// Wrap raw bytes. No curve check happens here; [`PublicKey::verify`]
    /// simply fails for bytes that are not a valid point.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Decode a base58 public key, rejecting anything that is not a valid
    /// Ed25519 point.
    pub fn from_base58(encoded: &str) -> Result<Self, KeyError> {
        let invalid = || KeyError::InvalidPublicKey(encoded.to_string());
        let bytes = bs58::decode(encoded).into_vec().map_err(|_| invalid())?;
        let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| invalid())?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| invalid())?;
        Ok(Self { bytes })
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.bytes).into_string()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Verify a 64-byte signature. Returns `false` on any failure, including
    /// a key that is not a valid curve point.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let signature = Signature::from_bytes(signature);
        verifying_key.verify(message, &signature).is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base58())
    }
}
