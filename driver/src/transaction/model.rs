//! The [`Transaction`] record and the hashing rules that tie it together.
//!
//! ## Canonical forms
//!
//! Two canonical renderings exist, both produced by [`crate::codec`]:
//!
//! - the **signing payload**: every `fulfillment` and the `id` set to
//!   `null`. Each input signs `SHA3-256(payload || txid || output_index)`,
//!   where the link part is only present for inputs that spend an output.
//! - the **id payload**: only `id` set to `null`. `id` is its SHA3-256 hex
//!   digest, computed after every fulfillment is in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::input::Input;
use super::output::Output;
use super::types::{Asset, Operation};
use crate::codec::{self, SerializationError};
use crate::crypto::hash::Sha3Hasher;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<String>,
    pub version: String,
    pub operation: Operation,
    pub asset: Asset,
    #[serde(default)]
    pub metadata: Option<Value>,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl Transaction {
    /// Parse wire JSON.
    pub fn from_value(value: Value) -> Result<Self, SerializationError> {
        serde_json::from_value(value).map_err(|e| SerializationError::malformed("transaction", e))
    }

    /// Wire JSON (not canonicalized; key order is whatever `serde_json` uses).
    pub fn to_value(&self) -> Result<Value, SerializationError> {
        serde_json::to_value(self).map_err(|e| SerializationError::Unrepresentable(e.to_string()))
    }

    /// Canonical rendering of the transaction as it stands.
    pub fn serialize(&self) -> Result<String, SerializationError> {
        codec::serialize(self)
    }

    /// Canonical rendering with every fulfillment and the id nulled.
    pub fn signing_payload(&self) -> Result<String, SerializationError> {
        let mut stripped = self.clone();
        stripped.id = None;
        for input in &mut stripped.inputs {
            input.fulfillment = None;
        }
        stripped.serialize()
    }

    /// The 32-byte message input `index` signs, given the signing payload.
    pub fn input_message(payload: &str, input: &Input) -> [u8; 32] {
        let mut hasher = Sha3Hasher::new();
        hasher.update(payload.as_bytes());
        if let Some(link) = &input.fulfills {
            hasher
                .update(link.transaction_id.as_bytes())
                .update(link.output_index.to_string().as_bytes());
        }
        hasher.finalize()
    }

    /// SHA3-256 hex of the canonical form with `id` nulled.
    pub fn compute_id(&self) -> Result<String, SerializationError> {
        let mut unidentified = self.clone();
        unidentified.id = None;
        Ok(codec::hash(unidentified.serialize()?.as_bytes()))
    }

    /// The asset this transaction concerns: its own id for CREATE, the
    /// linked id for TRANSFER.
    pub fn asset_id(&self) -> Option<&str> {
        match (self.operation, &self.asset) {
            (Operation::Create, _) => self.id.as_deref(),
            (Operation::Transfer, asset) => asset.id(),
        }
    }

    /// All inputs carry a fulfillment and the id is set.
    pub fn is_fulfilled(&self) -> bool {
        self.id.is_some() && self.inputs.iter().all(|i| i.fulfillment.is_some())
    }
}
