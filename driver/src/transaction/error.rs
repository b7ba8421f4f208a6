use thiserror::Error;

use super::types::Operation;
use crate::codec::SerializationError;
use crate::condition::ConditionError;
use crate::crypto::KeyError;

/// Errors raised while preparing or fulfilling a transaction.
///
/// These indicate bad caller input and are never retried.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error("unknown operation `{0}`: expected CREATE or TRANSFER")]
    UnknownOperation(String),

    #[error("at least one signer is required")]
    NoSigners,

    #[error("at least one recipient is required")]
    NoRecipients,

    #[error("at least one input is required")]
    NoInputs,

    #[error("an output needs at least one owner")]
    NoOwners,

    #[error("amount {amount} outside the allowed range 1..={max}")]
    InvalidAmount { amount: u64, max: u64 },

    #[error("{field} must be a JSON object or null")]
    InvalidPayload { field: &'static str },

    #[error("{operation} expects {expected}")]
    InvalidAsset {
        operation: Operation,
        expected: &'static str,
    },

    #[error("CREATE transactions do not take inputs")]
    UnexpectedInputs,

    #[error("input {index}: condition details do not lock exactly its owners_before")]
    OwnersMismatch { index: usize },

    #[error("output index {index} out of range: transaction has {len} output(s)")]
    OutputIndexOutOfRange { index: usize, len: usize },

    #[error("transaction has no id yet; fulfill it first")]
    MissingId,

    /// No supplied private key derives to an owner of this input. Nothing is
    /// signed when this is returned.
    #[error("input {index}: no private key for owner {public_key}")]
    MissingPrivateKey { index: usize, public_key: String },
}
