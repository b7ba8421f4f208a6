//! Preparing unsigned transactions.
//!
//! [`prepare_create`] and [`prepare_transfer`] return a [`Transaction`] with
//! every `fulfillment` and the `id` still `null`. Nothing here touches key
//! material; signing happens in [`super::signing`], which keeps preparation
//! testable without private keys.
//!
//! [`PrepareRequest`] is the operation-agnostic entry point: set the fields
//! for the operation at hand and pass it to [`prepare_transaction`].

use serde_json::Value;
use tracing::debug;

use super::input::Input;
use super::model::Transaction;
use super::output::{owners_fulfillment, Output};
use super::types::{Asset, Operation, TransactionLink};
use super::TransactionError;
use crate::condition::{ConditionDetails, Fulfillment};
use crate::config::TRANSACTION_VERSION;
use crate::crypto::PublicKey;

// ---------------------------------------------------------------------------
// Recipient / TransferInput
// ---------------------------------------------------------------------------

/// One output to create: `amount` locked to all of `public_keys`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub public_keys: Vec<String>,
    pub amount: u64,
}

impl Recipient {
    pub fn new<I, S>(public_keys: I, amount: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            public_keys: public_keys.into_iter().map(Into::into).collect(),
            amount,
        }
    }

    /// A recipient with a single owner.
    pub fn single(public_key: impl Into<String>, amount: u64) -> Self {
        Self {
            public_keys: vec![public_key.into()],
            amount,
        }
    }
}

/// An output to spend in a TRANSFER.
///
/// `fulfillment` holds the **condition details** of the spent output, not a
/// proof; the proof is produced later by [`fulfill`](super::fulfill).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInput {
    pub fulfillment: ConditionDetails,
    pub fulfills: TransactionLink,
    pub owners_before: Vec<String>,
}

impl TransferInput {
    /// Spend output `index` of an already fulfilled transaction.
    pub fn from_output(tx: &Transaction, index: usize) -> Result<Self, TransactionError> {
        let transaction_id = tx.id.clone().ok_or(TransactionError::MissingId)?;
        let out_of_range = || TransactionError::OutputIndexOutOfRange {
            index,
            len: tx.outputs.len(),
        };
        let output = tx.outputs.get(index).ok_or_else(out_of_range)?;
        let output_index = u32::try_from(index).map_err(|_| out_of_range())?;
        Ok(Self {
            fulfillment: output.condition.details.clone(),
            fulfills: TransactionLink {
                transaction_id,
                output_index,
            },
            owners_before: output.public_keys.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// CREATE / TRANSFER
// ---------------------------------------------------------------------------

/// Prepare a CREATE transaction.
///
/// `recipients` defaults to a single output of amount 1 owned by all
/// `signers`. `asset` is the asset's `data` payload and, like `metadata`,
/// must be a JSON object when present.
///
/// ```
/// use resdb_driver::crypto::generate_keypair;
/// use resdb_driver::transaction::{prepare_create, Recipient};
///
/// let alice = generate_keypair();
/// let bob = generate_keypair();
/// let tx = prepare_create(
///     &[alice.public_key.as_str()],
///     Some(vec![Recipient::single(bob.public_key.clone(), 10)]),
///     None,
///     None,
/// )
/// .unwrap();
/// assert_eq!(tx.outputs[0].amount, 10);
/// assert!(tx.id.is_none());
/// ```
pub fn prepare_create<S: AsRef<str>>(
    signers: &[S],
    recipients: Option<Vec<Recipient>>,
    asset: Option<Value>,
    metadata: Option<Value>,
) -> Result<Transaction, TransactionError> {
    if signers.is_empty() {
        return Err(TransactionError::NoSigners);
    }
    let signers: Vec<String> = signers.iter().map(|s| s.as_ref().to_string()).collect();
    for signer in &signers {
        PublicKey::from_base58(signer)?;
    }

    let recipients = match recipients {
        Some(list) if !list.is_empty() => list,
        _ => vec![Recipient::new(signers.clone(), 1)],
    };
    let outputs = build_outputs(&recipients)?;

    let tx = Transaction {
        id: None,
        version: TRANSACTION_VERSION.to_string(),
        operation: Operation::Create,
        asset: Asset::data(object_or_none(asset, "asset data")?),
        metadata: object_or_none(metadata, "metadata")?,
        inputs: vec![Input::unsigned(signers, None)],
        outputs,
    };
    debug!(
        outputs = tx.outputs.len(),
        signers = tx.inputs[0].owners_before.len(),
        "prepared CREATE transaction"
    );
    Ok(tx)
}

/// Prepare a TRANSFER of the outputs named by `inputs` to `recipients`.
///
/// `asset` must be the `{"id": ...}` link to the creating transaction. Each
/// input's condition details must lock exactly its `owners_before`.
pub fn prepare_transfer(
    inputs: Vec<TransferInput>,
    recipients: Vec<Recipient>,
    asset: Asset,
    metadata: Option<Value>,
) -> Result<Transaction, TransactionError> {
    if inputs.is_empty() {
        return Err(TransactionError::NoInputs);
    }
    if recipients.is_empty() {
        return Err(TransactionError::NoRecipients);
    }
    if asset.id().is_none() {
        return Err(TransactionError::InvalidAsset {
            operation: Operation::Transfer,
            expected: "an asset link {\"id\": <creating transaction id>}",
        });
    }

    let mut unsigned = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.into_iter().enumerate() {
        let described = Fulfillment::from_details(&input.fulfillment)?;
        let owned = owners_fulfillment(&input.owners_before)?;
        if described.condition_uri() != owned.condition_uri() {
            return Err(TransactionError::OwnersMismatch { index });
        }
        unsigned.push(Input::unsigned(input.owners_before, Some(input.fulfills)));
    }

    let tx = Transaction {
        id: None,
        version: TRANSACTION_VERSION.to_string(),
        operation: Operation::Transfer,
        asset,
        metadata: object_or_none(metadata, "metadata")?,
        inputs: unsigned,
        outputs: build_outputs(&recipients)?,
    };
    debug!(
        inputs = tx.inputs.len(),
        outputs = tx.outputs.len(),
        "prepared TRANSFER transaction"
    );
    Ok(tx)
}

fn build_outputs(recipients: &[Recipient]) -> Result<Vec<Output>, TransactionError> {
    recipients
        .iter()
        .map(|r| Output::generate(&r.public_keys, r.amount))
        .collect()
}

fn object_or_none(value: Option<Value>, field: &'static str) -> Result<Option<Value>, TransactionError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Object(_)) => Ok(Some(v)),
        Some(_) => Err(TransactionError::InvalidPayload { field }),
    }
}

// ---------------------------------------------------------------------------
// PrepareRequest
// ---------------------------------------------------------------------------

/// Operation-agnostic description of a transaction to prepare.
///
/// ```
/// use resdb_driver::crypto::generate_keypair;
/// use resdb_driver::transaction::{prepare_transaction, PrepareRequest};
///
/// let alice = generate_keypair();
/// let request = PrepareRequest::new("create".parse().unwrap())
///     .signers([alice.public_key.clone()])
///     .asset_data(serde_json::json!({"bicycle": "blue"}));
/// let tx = prepare_transaction(request).unwrap();
/// assert_eq!(tx.outputs[0].amount, 1);
/// ```
#[derive(Debug, Clone)]
pub struct PrepareRequest {
    pub operation: Operation,
    pub signers: Vec<String>,
    pub recipients: Option<Vec<Recipient>>,
    pub asset: Option<Asset>,
    pub metadata: Option<Value>,
    pub inputs: Vec<TransferInput>,
}

impl PrepareRequest {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            signers: Vec::new(),
            recipients: None,
            asset: None,
            metadata: None,
            inputs: Vec::new(),
        }
    }

    /// Signers of a CREATE.
    pub fn signers<I, S>(mut self, signers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signers = signers.into_iter().map(Into::into).collect();
        self
    }

    pub fn recipients(mut self, recipients: Vec<Recipient>) -> Self {
        self.recipients = Some(recipients);
        self
    }

    /// `{"data": ...}` for a CREATE.
    pub fn asset_data(mut self, data: Value) -> Self {
        self.asset = Some(Asset::data(Some(data)));
        self
    }

    /// `{"id": ...}` for a TRANSFER.
    pub fn asset_id(mut self, id: impl Into<String>) -> Self {
        self.asset = Some(Asset::link(id));
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Outputs to spend in a TRANSFER.
    pub fn inputs(mut self, inputs: Vec<TransferInput>) -> Self {
        self.inputs = inputs;
        self
    }
}

/// Prepare whichever operation `request` names.
pub fn prepare_transaction(request: PrepareRequest) -> Result<Transaction, TransactionError> {
    match request.operation {
        Operation::Create => {
            if !request.inputs.is_empty() {
                return Err(TransactionError::UnexpectedInputs);
            }
            let data = match request.asset {
                None => None,
                Some(Asset::Definition { data }) => data,
                Some(Asset::Link { .. }) => {
                    return Err(TransactionError::InvalidAsset {
                        operation: Operation::Create,
                        expected: "asset data {\"data\": ...}",
                    })
                }
            };
            prepare_create(&request.signers, request.recipients, data, request.metadata)
        }
        Operation::Transfer => {
            let asset = request.asset.ok_or(TransactionError::InvalidAsset {
                operation: Operation::Transfer,
                expected: "an asset link {\"id\": <creating transaction id>}",
            })?;
            prepare_transfer(
                request.inputs,
                request.recipients.unwrap_or_default(),
                asset,
                request.metadata,
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
