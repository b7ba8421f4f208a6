//! # Crypto-Conditions
//!
//! Output locks and input unlocks, in the crypto-conditions format
//! (draft-thomas-crypto-conditions-03) the ledger speaks.
//!
//! Two condition types are supported:
//!
//! - **ed25519-sha-256**: one public key, unlocked by one signature.
//! - **threshold-sha-256**: m-of-n over nested conditions. The builder uses
//!   it for outputs with several owners (n-of-n).
//!
//! A [`Condition`] is the public lock: a SHA-256 fingerprint plus a cost.
//! A [`Fulfillment`] is the structure that produces it, optionally carrying
//! signatures. [`ConditionDetails`] is the JSON description stored in an
//! output's `condition.details`.
//!
//! ```text
//! Fulfillment ──condition()──▶ Condition ──serialize_uri()──▶ "ni:///sha-256;...?fpt=...&cost=..."
//!      │
//!      └──serialize_uri()──▶ base64url(DER)     (only once signed)
//! ```

pub mod der;
pub mod ed25519;
pub mod threshold;

pub use ed25519::Ed25519Sha256;
pub use threshold::{Subcondition, ThresholdSha256};

use std::collections::BTreeSet;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{KeyError, PrivateKey, PublicKey};

/// Deepest chain of nested threshold fulfillments accepted when parsing.
pub const MAX_NESTING: usize = 16;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConditionError {
    #[error("malformed DER: {0}")]
    Der(String),

    #[error("invalid fulfillment URI: {0}")]
    InvalidUri(String),

    #[error("unsupported condition type: {0}")]
    UnsupportedType(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("invalid condition details: {0}")]
    InvalidDetails(String),

    #[error("fulfillment is not signed")]
    Unsigned,

    #[error("threshold {threshold} not met: {fulfilled} subfulfillment(s) signed")]
    ThresholdNotMet { threshold: usize, fulfilled: usize },

    #[error("key {public_key} does not appear in the condition")]
    KeyMismatch { public_key: String },

    #[error("subcondition is only known by its fingerprint and has no details")]
    OpaqueSubcondition,
}

impl ConditionError {
    pub(crate) fn der(reason: impl Into<String>) -> Self {
        Self::Der(reason.into())
    }
}

// ---------------------------------------------------------------------------
// ConditionType
// ---------------------------------------------------------------------------

/// Registered crypto-condition types. Only the last two can be built or
/// fulfilled here, but the others may show up as opaque subconditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConditionType {
    PreimageSha256 = 0,
    PrefixSha256 = 1,
    ThresholdSha256 = 2,
    RsaSha256 = 3,
    Ed25519Sha256 = 4,
}

impl ConditionType {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Result<Self, ConditionError> {
        match id {
            0 => Ok(Self::PreimageSha256),
            1 => Ok(Self::PrefixSha256),
            2 => Ok(Self::ThresholdSha256),
            3 => Ok(Self::RsaSha256),
            4 => Ok(Self::Ed25519Sha256),
            other => Err(ConditionError::UnsupportedType(format!("type id {}", other))),
        }
    }

    /// Name used in URIs and in the details JSON.
    pub fn name(self) -> &'static str {
        match self {
            Self::PreimageSha256 => "preimage-sha-256",
            Self::PrefixSha256 => "prefix-sha-256",
            Self::ThresholdSha256 => "threshold-sha-256",
            Self::RsaSha256 => "rsa-sha-256",
            Self::Ed25519Sha256 => "ed25519-sha-256",
        }
    }

    /// Compound types carry a subtypes bitmap in their condition.
    pub fn is_compound(self) -> bool {
        matches!(self, Self::PrefixSha256 | Self::ThresholdSha256)
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// A public lock: type, fingerprint, cost and (for compound types) the set
/// of condition types used underneath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition {
    pub condition_type: ConditionType,
    pub fingerprint: [u8; 32],
    pub cost: u64,
    pub subtypes: BTreeSet<ConditionType>,
}

impl Condition {
    /// `ni:///sha-256;<fingerprint>?fpt=<type>&cost=<cost>[&subtypes=...]`
    pub fn serialize_uri(&self) -> String {
        let mut uri = format!(
            "ni:///sha-256;{}?fpt={}&cost={}",
            URL_SAFE_NO_PAD.encode(self.fingerprint),
            self.condition_type.name(),
            self.cost
        );
        if self.condition_type.is_compound() && !self.subtypes.is_empty() {
            let mut names: Vec<&str> = self.subtypes.iter().map(|t| t.name()).collect();
            names.sort_unstable();
            uri.push_str("&subtypes=");
            uri.push_str(&names.join(","));
        }
        uri
    }

    /// DER encoding, as embedded in threshold fingerprints and fulfillments.
    pub fn to_der(&self) -> Vec<u8> {
        let mut content = der::tlv(der::context(0), &self.fingerprint);
        content.extend(der::tlv(der::context(1), &der::integer(self.cost)));
        if self.condition_type.is_compound() {
            let ids: BTreeSet<u8> = self.subtypes.iter().map(|t| t.id()).collect();
            content.extend(der::tlv(der::context(2), &der::bit_string(&ids)));
        }
        der::tlv(der::context_constructed(self.condition_type.id()), &content)
    }

    /// Decode one condition from `reader`.
    pub fn read(reader: &mut der::Reader<'_>) -> Result<Self, ConditionError> {
        let (tag, content) = reader.read()?;
        if tag & 0xE0 != 0xA0 {
            return Err(ConditionError::der(format!("{:#04x} is not a condition tag", tag)));
        }
        let condition_type = ConditionType::from_id(tag & 0x1F)?;

        let mut fields = der::Reader::new(content);
        let fingerprint: [u8; 32] = fields
            .expect(der::context(0))?
            .try_into()
            .map_err(|_| ConditionError::der("fingerprint must be 32 bytes"))?;
        let cost = der::decode_integer(fields.expect(der::context(1))?)?;
        let mut subtypes = BTreeSet::new();
        if condition_type.is_compound() {
            for id in der::decode_bit_string(fields.expect(der::context(2))?)? {
                subtypes.insert(ConditionType::from_id(id)?);
            }
        }
        fields.finish()?;

        Ok(Self {
            condition_type,
            fingerprint,
            cost,
            subtypes,
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize_uri())
    }
}

// ---------------------------------------------------------------------------
// ConditionDetails
// ---------------------------------------------------------------------------

/// JSON description of a condition, stored as `output.condition.details`.
///
/// ```
/// use resdb_driver::condition::ConditionDetails;
///
/// let details: ConditionDetails = serde_json::from_str(
///     r#"{"type":"ed25519-sha-256","public_key":"4zvwRjXUKGfvwnParsHAS3HuSVzV5cA4McphgmoCtajS"}"#,
/// ).unwrap();
/// assert!(matches!(details, ConditionDetails::Ed25519 { .. }));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConditionDetails {
    #[serde(rename = "ed25519-sha-256")]
    Ed25519 { public_key: String },

    #[serde(rename = "threshold-sha-256")]
    Threshold {
        threshold: usize,
        subconditions: Vec<ConditionDetails>,
    },
}

// ---------------------------------------------------------------------------
// Fulfillment
// ---------------------------------------------------------------------------

/// A condition structure that can be signed and, once signed, serialized
/// into a fulfillment URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fulfillment {
    Ed25519(Ed25519Sha256),
    Threshold(ThresholdSha256),
}

impl Fulfillment {
    /// Single-key fulfillment without a signature.
    pub fn ed25519(public_key: PublicKey) -> Self {
        Self::Ed25519(Ed25519Sha256::new(public_key))
    }

    /// Build the unsigned structure described by `details`.
    pub fn from_details(details: &ConditionDetails) -> Result<Self, ConditionError> {
        match details {
            ConditionDetails::Ed25519 { public_key } => {
                Ok(Self::ed25519(PublicKey::from_base58(public_key)?))
            }
            ConditionDetails::Threshold {
                threshold,
                subconditions,
            } => {
                if *threshold == 0 || *threshold > subconditions.len() {
                    return Err(ConditionError::InvalidDetails(format!(
                        "threshold {} with {} subconditions",
                        threshold,
                        subconditions.len()
                    )));
                }
                let mut node = ThresholdSha256::new(*threshold);
                for sub in subconditions {
                    node.add_subfulfillment(Self::from_details(sub)?);
                }
                Ok(Self::Threshold(node))
            }
        }
    }

    /// JSON description of this structure.
    pub fn to_details(&self) -> Result<ConditionDetails, ConditionError> {
        match self {
            Self::Ed25519(f) => Ok(ConditionDetails::Ed25519 {
                public_key: f.public_key().to_base58(),
            }),
            Self::Threshold(node) => {
                let subconditions = node
                    .subconditions()
                    .iter()
                    .map(|sub| match sub {
                        Subcondition::Fulfillment(f) => f.to_details(),
                        Subcondition::Condition(_) => Err(ConditionError::OpaqueSubcondition),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ConditionDetails::Threshold {
                    threshold: node.threshold(),
                    subconditions,
                })
            }
        }
    }

    pub fn condition_type(&self) -> ConditionType {
        match self {
            Self::Ed25519(_) => ConditionType::Ed25519Sha256,
            Self::Threshold(_) => ConditionType::ThresholdSha256,
        }
    }

    pub fn cost(&self) -> u64 {
        match self {
            Self::Ed25519(_) => ed25519::COST,
            Self::Threshold(node) => node.cost(),
        }
    }

    /// The condition this structure satisfies. Signatures do not affect it.
    pub fn condition(&self) -> Condition {
        match self {
            Self::Ed25519(f) => f.condition(),
            Self::Threshold(node) => node.condition(),
        }
    }

    pub fn condition_uri(&self) -> String {
        self.condition().serialize_uri()
    }

    /// Whether enough signatures are present to serialize.
    pub fn is_fulfilled(&self) -> bool {
        match self {
            Self::Ed25519(f) => f.signature().is_some(),
            Self::Threshold(node) => node.is_fulfilled(),
        }
    }

    /// Every Ed25519 key appearing in the structure, in tree order.
    pub fn public_keys(&self) -> Vec<PublicKey> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys(&self, out: &mut Vec<PublicKey>) {
        match self {
            Self::Ed25519(f) => out.push(*f.public_key()),
            Self::Threshold(node) => {
                for sub in node.subconditions() {
                    if let Subcondition::Fulfillment(f) = sub {
                        f.collect_keys(out);
                    }
                }
            }
        }
    }

    /// Sign `message` with `key` wherever its public key appears.
    ///
    /// Fails with [`ConditionError::KeyMismatch`] if the key appears nowhere.
    pub fn sign(&mut self, message: &[u8], key: &PrivateKey) -> Result<(), ConditionError> {
        if self.sign_matching(message, key) == 0 {
            return Err(ConditionError::KeyMismatch {
                public_key: key.public_key().to_base58(),
            });
        }
        Ok(())
    }

    pub(crate) fn sign_matching(&mut self, message: &[u8], key: &PrivateKey) -> usize {
        match self {
            Self::Ed25519(f) => {
                if *f.public_key() == key.public_key() {
                    f.sign(message, key);
                    1
                } else {
                    0
                }
            }
            Self::Threshold(node) => node
                .subconditions_mut()
                .iter_mut()
                .map(|sub| match sub {
                    Subcondition::Fulfillment(f) => f.sign_matching(message, key),
                    Subcondition::Condition(_) => 0,
                })
                .sum(),
        }
    }

    /// Check every signature against `message` and the threshold arithmetic.
    pub fn validate(&self, message: &[u8]) -> bool {
        match self {
            Self::Ed25519(f) => f.validate(message),
            Self::Threshold(node) => node.validate(message),
        }
    }

    pub fn to_der(&self) -> Result<Vec<u8>, ConditionError> {
        match self {
            Self::Ed25519(f) => f.to_der(),
            Self::Threshold(node) => node.to_der(),
        }
    }

    /// Decode one fulfillment from `reader`.
    pub fn read(reader: &mut der::Reader<'_>) -> Result<Self, ConditionError> {
        Self::read_nested(reader, 0)
    }

    /// `depth` counts the threshold fulfillments enclosing this one.
    pub(crate) fn read_nested(reader: &mut der::Reader<'_>, depth: usize) -> Result<Self, ConditionError> {
        if depth > MAX_NESTING {
            return Err(ConditionError::der("nesting too deep"));
        }
        let (tag, content) = reader.read()?;
        match tag {
            t if t == der::context_constructed(ConditionType::Ed25519Sha256.id()) => {
                Ok(Self::Ed25519(Ed25519Sha256::from_der_content(content)?))
            }
            t if t == der::context_constructed(ConditionType::ThresholdSha256.id()) => Ok(
                Self::Threshold(ThresholdSha256::from_der_content(content, depth)?),
            ),
            other if other & 0xE0 == 0xA0 => Err(ConditionError::UnsupportedType(
                ConditionType::from_id(other & 0x1F)?.name().to_string(),
            )),
            other => Err(ConditionError::der(format!(
                "{:#04x} is not a fulfillment tag",
                other
            ))),
        }
    }

    pub fn from_der(bytes: &[u8]) -> Result<Self, ConditionError> {
        let mut reader = der::Reader::new(bytes);
        let fulfillment = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(fulfillment)
    }

    /// Fulfillment URI: unpadded base64url of the DER encoding.
    pub fn serialize_uri(&self) -> Result<String, ConditionError> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_der()?))
    }

    /// Parse a fulfillment URI. Trailing `=` padding is tolerated.
    pub fn from_uri(uri: &str) -> Result<Self, ConditionError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(uri.trim_end_matches('='))
            .map_err(|e| ConditionError::InvalidUri(e.to_string()))?;
        Self::from_der(&bytes)
    }
}
