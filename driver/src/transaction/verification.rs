//! Validating received transactions.
//!
//! Validation re-derives everything the sender claims and never mutates
//! the transaction. Each transaction moves through
//!
//! ```text
//! Received ──▶ InputsChecked ──▶ SignatureChecked ──▶ Valid
//!     │              │                  │
//!     └──────────────┴──────────────────┴──▶ Invalid(reason)
//! ```
//!
//! 1. **Received**: structure, then duplicates (committed or earlier in the
//!    batch).
//! 2. **InputsChecked**: TRANSFER links resolve to existing outputs that
//!    nobody has spent.
//! 3. **SignatureChecked**: every fulfillment parses, unlocks the right
//!    condition and verifies against its input message.
//! 4. **Valid**: amounts (range and conservation), asset id, output
//!    condition encodings and finally the id hash.
//!
//! Signatures are checked before amounts and the id, so tampering with a
//! fulfilled transaction shows up as [`ValidationError::InvalidSignature`].

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use thiserror::Error;
use tracing::debug;

use super::ledger::LedgerView;
use super::model::Transaction;
use super::output::{owners_fulfillment, Output};
use super::types::{Asset, Operation, TransactionLink};
use crate::condition::Fulfillment;
use crate::config::{MAX_AMOUNT, TRANSACTION_VERSION};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Where a transaction is in validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    Received,
    InputsChecked,
    SignatureChecked,
    Valid,
    Invalid,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::InputsChecked => "inputs-checked",
            Self::SignatureChecked => "signature-checked",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// What is wrong with the amounts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountIssue {
    #[error("spent outputs total {input_total} but new outputs total {output_total}")]
    Mismatch { input_total: u128, output_total: u128 },

    #[error("output {output_index} has amount {amount}, outside 1..={max}")]
    OutOfRange {
        output_index: usize,
        amount: u64,
        max: u64,
    },
}

/// Why a transaction is invalid.
///
/// These are protocol outcomes, not infrastructure failures: the
/// transaction was read fine and is simply not acceptable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed transaction: {0}")]
    InvalidStructure(String),

    #[error("transaction {id} already exists")]
    DuplicateTransaction { id: String },

    #[error("input {input_index}: output {link} does not exist")]
    InputDoesNotExist {
        input_index: usize,
        link: TransactionLink,
    },

    /// `spent_by` is `None` when an earlier input of the same transaction
    /// spends the output.
    #[error("input {input_index}: output {link} is already spent")]
    DoubleSpend {
        input_index: usize,
        link: TransactionLink,
        spent_by: Option<String>,
    },

    #[error("input {input_index}: invalid signature: {reason}")]
    InvalidSignature { input_index: usize, reason: String },

    #[error("amount error: {0}")]
    AmountError(AmountIssue),

    #[error("asset id mismatch: transaction names {expected}, spent outputs belong to {found:?}")]
    AssetIdMismatch { expected: String, found: Vec<String> },

    #[error("output {output_index}: invalid condition: {reason}")]
    InvalidCondition { output_index: usize, reason: String },

    #[error("id mismatch: content hashes to {expected}, transaction says {found:?}")]
    InvalidHash {
        expected: String,
        found: Option<String>,
    },
}

impl ValidationError {
    /// The last stage the transaction passed before failing.
    pub fn stage(&self) -> ValidationStage {
        match self {
            Self::InvalidStructure(_)
            | Self::DuplicateTransaction { .. }
            | Self::InputDoesNotExist { .. }
            | Self::DoubleSpend { .. } => ValidationStage::Received,
            Self::InvalidSignature { .. } => ValidationStage::InputsChecked,
            Self::AmountError(_)
            | Self::AssetIdMismatch { .. }
            | Self::InvalidCondition { .. }
            | Self::InvalidHash { .. } => ValidationStage::SignatureChecked,
        }
    }
}

fn invalid_signature(input_index: usize, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidSignature {
        input_index,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Validates transactions against a [`LedgerView`].
pub struct Validator<'l, L: LedgerView + ?Sized> {
    ledger: &'l L,
}

/// Transactions accepted earlier in the same batch.
#[derive(Default)]
struct Batch<'t> {
    created: HashMap<&'t str, &'t Transaction>,
    spent: HashMap<&'t TransactionLink, &'t str>,
}

impl<'t> Batch<'t> {
    fn accept(&mut self, tx: &'t Transaction) {
        let Some(id) = tx.id.as_deref() else {
            return;
        };
        self.created.insert(id, tx);
        for input in &tx.inputs {
            if let Some(link) = &input.fulfills {
                self.spent.insert(link, id);
            }
        }
    }
}

/// An output being spent, plus the asset it belongs to.
struct Spent {
    output: Output,
    asset_id: Option<String>,
}

impl<'l, L: LedgerView + ?Sized> Validator<'l, L> {
    pub fn new(ledger: &'l L) -> Self {
        Self { ledger }
    }

    /// Validate one transaction. Returns it unchanged if valid.
    pub fn validate<'t>(&self, tx: &'t Transaction) -> Result<&'t Transaction, ValidationError> {
        self.check(tx, &Batch::default()).map(|()| tx)
    }

    /// Validate transactions in order as if submitted together: a member
    /// may spend outputs of an earlier accepted member, and a later member
    /// that repeats an accepted one or spends the same output fails.
    pub fn validate_batch<'t>(
        &self,
        txs: &'t [Transaction],
    ) -> Vec<Result<&'t Transaction, ValidationError>> {
        let mut batch = Batch::default();
        let mut results = Vec::with_capacity(txs.len());
        for tx in txs {
            let result = self.check(tx, &batch);
            if result.is_ok() {
                batch.accept(tx);
            }
            results.push(result.map(|()| tx));
        }
        results
    }

    fn check(&self, tx: &Transaction, batch: &Batch<'_>) -> Result<(), ValidationError> {
        let result = self.run_stages(tx, batch);
        match &result {
            Ok(()) => debug!(id = ?tx.id, stage = %ValidationStage::Valid, "transaction valid"),
            Err(e) => debug!(
                id = ?tx.id,
                stage = %ValidationStage::Invalid,
                passed = %e.stage(),
                error = %e,
                "transaction invalid"
            ),
        }
        result
    }

    fn run_stages(&self, tx: &Transaction, batch: &Batch<'_>) -> Result<(), ValidationError> {
        check_structure(tx)?;
        if let Some(id) = tx.id.as_deref() {
            if batch.created.contains_key(id) || self.ledger.contains(id) {
                return Err(ValidationError::DuplicateTransaction { id: id.to_string() });
            }
        }

        let spent = match tx.operation {
            Operation::Create => Vec::new(),
            Operation::Transfer => self.resolve_inputs(tx, batch)?,
        };
        debug!(id = ?tx.id, stage = %ValidationStage::InputsChecked);

        check_signatures(tx, &spent)?;
        debug!(id = ?tx.id, stage = %ValidationStage::SignatureChecked);

        check_amounts(tx, &spent)?;
        check_asset(tx, &spent)?;
        check_output_conditions(tx)?;
        check_hash(tx)
    }

    fn resolve_inputs(&self, tx: &Transaction, batch: &Batch<'_>) -> Result<Vec<Spent>, ValidationError> {
        let mut seen = HashSet::new();
        let mut spent = Vec::with_capacity(tx.inputs.len());

        for (input_index, input) in tx.inputs.iter().enumerate() {
            let link = input.fulfills.as_ref().ok_or_else(|| {
                ValidationError::InvalidStructure(format!("input {} spends nothing", input_index))
            })?;
            let missing = || ValidationError::InputDoesNotExist {
                input_index,
                link: link.clone(),
            };

            let parent: Cow<'_, Transaction> = match batch.created.get(link.transaction_id.as_str()) {
                Some(member) => Cow::Borrowed(*member),
                None => Cow::Owned(
                    self.ledger
                        .get_transaction(&link.transaction_id)
                        .ok_or_else(missing)?,
                ),
            };
            let output = parent
                .outputs
                .get(link.output_index as usize)
                .ok_or_else(missing)?;

            if !seen.insert(link) {
                return Err(ValidationError::DoubleSpend {
                    input_index,
                    link: link.clone(),
                    spent_by: None,
                });
            }
            let spender = batch
                .spent
                .get(link)
                .map(|id| id.to_string())
                .or_else(|| self.ledger.spent_by(link));
            if let Some(spender) = spender {
                return Err(ValidationError::DoubleSpend {
                    input_index,
                    link: link.clone(),
                    spent_by: Some(spender),
                });
            }

            spent.push(Spent {
                output: output.clone(),
                asset_id: parent.asset_id().map(str::to_string),
            });
        }
        Ok(spent)
    }
}

/// Validate a single transaction against `ledger`.
pub fn validate_transaction<'t, L: LedgerView + ?Sized>(
    tx: &'t Transaction,
    ledger: &L,
) -> Result<&'t Transaction, ValidationError> {
    Validator::new(ledger).validate(tx)
}

// ---------------------------------------------------------------------------
// Stage checks
// ---------------------------------------------------------------------------

fn check_structure(tx: &Transaction) -> Result<(), ValidationError> {
    let malformed = |reason: &str| Err(ValidationError::InvalidStructure(reason.to_string()));

    if tx.version != TRANSACTION_VERSION {
        return Err(ValidationError::InvalidStructure(format!(
            "unsupported version {}",
            tx.version
        )));
    }
    if tx.inputs.is_empty() {
        return malformed("no inputs");
    }
    if tx.outputs.is_empty() {
        return malformed("no outputs");
    }
    match (tx.operation, &tx.asset) {
        (Operation::Create, Asset::Definition { .. }) => {
            if tx.inputs.iter().any(|i| i.fulfills.is_some()) {
                return malformed("CREATE inputs must not spend outputs");
            }
        }
        (Operation::Transfer, Asset::Link { .. }) => {
            if tx.inputs.iter().any(|i| i.fulfills.is_none()) {
                return malformed("every TRANSFER input must spend an output");
            }
        }
        (Operation::Create, Asset::Link { .. }) => return malformed("CREATE asset must carry data"),
        (Operation::Transfer, Asset::Definition { .. }) => {
            return malformed("TRANSFER asset must link to its creating transaction")
        }
    }
    Ok(())
}

fn check_signatures(tx: &Transaction, spent: &[Spent]) -> Result<(), ValidationError> {
    let payload = tx
        .signing_payload()
        .map_err(|e| ValidationError::InvalidStructure(e.to_string()))?;

    for (input_index, input) in tx.inputs.iter().enumerate() {
        let uri = input
            .fulfillment
            .as_deref()
            .ok_or_else(|| invalid_signature(input_index, "missing fulfillment"))?;
        let parsed = Fulfillment::from_uri(uri)
            .map_err(|e| invalid_signature(input_index, format!("unreadable fulfillment: {}", e)))?;

        let expected_condition = match tx.operation {
            Operation::Create => owners_fulfillment(&input.owners_before)
                .map_err(|e| invalid_signature(input_index, e.to_string()))?
                .condition_uri(),
            Operation::Transfer => spent
                .get(input_index)
                .map(|s| s.output.condition.uri.clone())
                .unwrap_or_default(),
        };
        if parsed.condition_uri() != expected_condition {
            return Err(invalid_signature(
                input_index,
                "fulfillment does not unlock the expected condition",
            ));
        }

        let message = Transaction::input_message(&payload, input);
        if !parsed.validate(&message) {
            return Err(invalid_signature(input_index, "signature does not verify"));
        }
    }
    Ok(())
}

fn check_amounts(tx: &Transaction, spent: &[Spent]) -> Result<(), ValidationError> {
    for (output_index, output) in tx.outputs.iter().enumerate() {
        if output.amount == 0 || output.amount > MAX_AMOUNT {
            return Err(ValidationError::AmountError(AmountIssue::OutOfRange {
                output_index,
                amount: output.amount,
                max: MAX_AMOUNT,
            }));
        }
    }
    if tx.operation == Operation::Transfer {
        let input_total: u128 = spent.iter().map(|s| u128::from(s.output.amount)).sum();
        let output_total: u128 = tx.outputs.iter().map(|o| u128::from(o.amount)).sum();
        if input_total != output_total {
            return Err(ValidationError::AmountError(AmountIssue::Mismatch {
                input_total,
                output_total,
            }));
        }
    }
    Ok(())
}

fn check_asset(tx: &Transaction, spent: &[Spent]) -> Result<(), ValidationError> {
    if tx.operation != Operation::Transfer {
        return Ok(());
    }
    let expected = tx.asset.id().unwrap_or_default();
    let found: BTreeSet<String> = spent
        .iter()
        .map(|s| s.asset_id.clone().unwrap_or_default())
        .collect();
    if found.len() != 1 || !found.contains(expected) {
        return Err(ValidationError::AssetIdMismatch {
            expected: expected.to_string(),
            found: found.into_iter().collect(),
        });
    }
    Ok(())
}

fn check_output_conditions(tx: &Transaction) -> Result<(), ValidationError> {
    for (output_index, output) in tx.outputs.iter().enumerate() {
        let invalid = |reason: String| ValidationError::InvalidCondition {
            output_index,
            reason,
        };
        let fulfillment =
            Fulfillment::from_details(&output.condition.details).map_err(|e| invalid(e.to_string()))?;
        if fulfillment.condition_uri() != output.condition.uri {
            return Err(invalid("uri is not the encoding of details".into()));
        }

        let mut in_condition: Vec<String> =
            fulfillment.public_keys().iter().map(|k| k.to_base58()).collect();
        let mut listed = output.public_keys.clone();
        in_condition.sort_unstable();
        listed.sort_unstable();
        if in_condition != listed {
            return Err(invalid("public_keys differ from the keys in the condition".into()));
        }
    }
    Ok(())
}

fn check_hash(tx: &Transaction) -> Result<(), ValidationError> {
    let expected = tx
        .compute_id()
        .map_err(|e| ValidationError::InvalidStructure(e.to_string()))?;
    if tx.id.as_deref() != Some(expected.as_str()) {
        return Err(ValidationError::InvalidHash {
            expected,
            found: tx.id.clone(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_keypair, CryptoKeypair};
    use crate::transaction::{
        fulfill, prepare_create, prepare_transfer, MemoryLedger, Recipient, TransferInput,
    };

    struct World {
        alice: CryptoKeypair,
        bob: CryptoKeypair,
        ledger: MemoryLedger,
        create: Transaction,
    }

    /// Alice issues 10 to Bob and the CREATE is committed.
    fn world() -> World {
        let (alice, bob) = (generate_keypair(), generate_keypair());
        let prepared = prepare_create(
            &[&alice.public_key],
            Some(vec![Recipient::single(bob.public_key.clone(), 10)]),
            Some(serde_json::json!({"item": "bike"})),
            None,
        )
        .unwrap();
        let create = fulfill(&prepared, &[&alice.private_key]).unwrap();
        let ledger = MemoryLedger::new();
        ledger.commit(create.clone()).unwrap();
        World {
            alice,
            bob,
            ledger,
            create,
        }
    }

    fn bob_pays(w: &World, to_alice: u64, to_bob: u64) -> Transaction {
        let prepared = prepare_transfer(
            vec![TransferInput::from_output(&w.create, 0).unwrap()],
            vec![
                Recipient::single(w.alice.public_key.clone(), to_alice),
                Recipient::single(w.bob.public_key.clone(), to_bob),
            ],
            Asset::link(w.create.id.clone().unwrap()),
            None,
        )
        .unwrap();
        fulfill(&prepared, &[&w.bob.private_key]).unwrap()
    }

    #[test]
    fn valid_create_passes() {
        let alice = generate_keypair();
        let tx = fulfill(
            &prepare_create(&[&alice.public_key], None, None, None).unwrap(),
            &[&alice.private_key],
        )
        .unwrap();
        assert!(validate_transaction(&tx, &MemoryLedger::new()).is_ok());
    }

    #[test]
    fn valid_transfer_passes() {
        let w = world();
        let tx = bob_pays(&w, 4, 6);
        assert_eq!(Validator::new(&w.ledger).validate(&tx), Ok(&tx));
    }

    #[test]
    fn overspend_is_amount_error() {
        let w = world();
        let tx = bob_pays(&w, 4, 7);
        match Validator::new(&w.ledger).validate(&tx) {
            Err(ValidationError::AmountError(AmountIssue::Mismatch {
                input_total: 10,
                output_total: 11,
            })) => {}
            other => panic!("expected AmountError, got {:?}", other),
        }
    }

    #[test]
    fn tampered_amount_is_invalid_signature() {
        let w = world();
        let mut tx = bob_pays(&w, 4, 6);
        tx.outputs[0].amount = 5;
        let err = Validator::new(&w.ledger).validate(&tx).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSignature { input_index: 0, .. }));
        assert_eq!(err.stage(), ValidationStage::InputsChecked);
    }

    #[test]
    fn tampered_public_key_is_invalid_signature() {
        let w = world();
        let mut tx = bob_pays(&w, 4, 6);
        tx.outputs[1].public_keys[0] = generate_keypair().public_key;
        assert!(matches!(
            Validator::new(&w.ledger).validate(&tx),
            Err(ValidationError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn unsigned_is_invalid_signature() {
        let alice = generate_keypair();
        let tx = prepare_create(&[&alice.public_key], None, None, None).unwrap();
        match validate_transaction(&tx, &MemoryLedger::new()) {
            Err(ValidationError::InvalidSignature { reason, .. }) => {
                assert!(reason.contains("missing"))
            }
            other => panic!("expected InvalidSignature, got {:?}", other),
        }
    }

    #[test]
    fn create_signed_by_stranger_fails() {
        let (alice, mallory) = (generate_keypair(), generate_keypair());
        let prepared = prepare_create(&[&alice.public_key], None, None, None).unwrap();
        let forged = fulfill(&prepared, &[&alice.private_key]).unwrap();

        let mut by_mallory = prepared.clone();
        by_mallory.inputs[0].owners_before = vec![mallory.public_key.clone()];
        let by_mallory = fulfill(&by_mallory, &[&mallory.private_key]).unwrap();

        let mut spliced = forged.clone();
        spliced.inputs[0].fulfillment = by_mallory.inputs[0].fulfillment.clone();
        assert!(matches!(
            validate_transaction(&spliced, &MemoryLedger::new()),
            Err(ValidationError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn committed_create_is_duplicate() {
        let w = world();
        match Validator::new(&w.ledger).validate(&w.create) {
            Err(ValidationError::DuplicateTransaction { id }) => {
                assert_eq!(Some(id), w.create.id.clone())
            }
            other => panic!("expected DuplicateTransaction, got {:?}", other),
        }
    }

    #[test]
    fn unknown_input_does_not_exist() {
        let w = world();
        let mut prepared = prepare_transfer(
            vec![TransferInput::from_output(&w.create, 0).unwrap()],
            vec![Recipient::single(w.alice.public_key.clone(), 10)],
            Asset::link(w.create.id.clone().unwrap()),
            None,
        )
        .unwrap();
        prepared.inputs[0].fulfills = Some(TransactionLink::new("ff".repeat(32), 0));
        let tx = fulfill(&prepared, &[&w.bob.private_key]).unwrap();
        assert!(matches!(
            Validator::new(&w.ledger).validate(&tx),
            Err(ValidationError::InputDoesNotExist { input_index: 0, .. })
        ));
    }

    #[test]
    fn spending_committed_spend_is_double_spend() {
        let w = world();
        let first = bob_pays(&w, 4, 6);
        let first_id = w.ledger.commit(first).unwrap();
        let second = bob_pays(&w, 5, 5);
        match Validator::new(&w.ledger).validate(&second) {
            Err(ValidationError::DoubleSpend { spent_by, .. }) => {
                assert_eq!(spent_by, Some(first_id))
            }
            other => panic!("expected DoubleSpend, got {:?}", other),
        }
    }

    #[test]
    fn same_output_twice_in_one_transaction() {
        let w = world();
        let input = TransferInput::from_output(&w.create, 0).unwrap();
        let prepared = prepare_transfer(
            vec![input.clone(), input],
            vec![Recipient::single(w.alice.public_key.clone(), 20)],
            Asset::link(w.create.id.clone().unwrap()),
            None,
        )
        .unwrap();
        let tx = fulfill(&prepared, &[&w.bob.private_key]).unwrap();
        assert!(matches!(
            Validator::new(&w.ledger).validate(&tx),
            Err(ValidationError::DoubleSpend {
                input_index: 1,
                spent_by: None,
                ..
            })
        ));
    }

    #[test]
    fn batch_double_spend_admits_exactly_one() {
        let w = world();
        let batch = vec![bob_pays(&w, 4, 6), bob_pays(&w, 3, 7)];
        let results = Validator::new(&w.ledger).validate_batch(&batch);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ValidationError::DoubleSpend { .. })
        ));
    }

    #[test]
    fn batch_duplicate_is_rejected() {
        let alice = generate_keypair();
        let tx = fulfill(
            &prepare_create(&[&alice.public_key], None, None, None).unwrap(),
            &[&alice.private_key],
        )
        .unwrap();
        let batch = vec![tx.clone(), tx];
        let results = Validator::new(&MemoryLedger::new()).validate_batch(&batch);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ValidationError::DuplicateTransaction { .. })
        ));
    }

    #[test]
    fn batch_member_can_spend_earlier_member() {
        let alice = generate_keypair();
        let create = fulfill(
            &prepare_create(&[&alice.public_key], None, None, None).unwrap(),
            &[&alice.private_key],
        )
        .unwrap();
        let transfer = fulfill(
            &prepare_transfer(
                vec![TransferInput::from_output(&create, 0).unwrap()],
                vec![Recipient::single(alice.public_key.clone(), 1)],
                Asset::link(create.id.clone().unwrap()),
                None,
            )
            .unwrap(),
            &[&alice.private_key],
        )
        .unwrap();
        let batch = vec![create, transfer];
        let results = Validator::new(&MemoryLedger::new()).validate_batch(&batch);
        assert!(results.iter().all(Result::is_ok));
    }

    #[test]
    fn wrong_asset_link_is_mismatch() {
        let w = world();
        let prepared = prepare_transfer(
            vec![TransferInput::from_output(&w.create, 0).unwrap()],
            vec![Recipient::single(w.alice.public_key.clone(), 10)],
            Asset::link("ab".repeat(32)),
            None,
        )
        .unwrap();
        let tx = fulfill(&prepared, &[&w.bob.private_key]).unwrap();
        match Validator::new(&w.ledger).validate(&tx) {
            Err(ValidationError::AssetIdMismatch { expected, found }) => {
                assert_eq!(expected, "ab".repeat(32));
                assert_eq!(found, vec![w.create.id.clone().unwrap()]);
            }
            other => panic!("expected AssetIdMismatch, got {:?}", other),
        }
    }

    #[test]
    fn out_of_range_amount() {
        let alice = generate_keypair();
        let mut prepared = prepare_create(&[&alice.public_key], None, None, None).unwrap();
        prepared.outputs[0].amount = MAX_AMOUNT + 1;
        let tx = fulfill(&prepared, &[&alice.private_key]).unwrap();
        assert!(matches!(
            validate_transaction(&tx, &MemoryLedger::new()),
            Err(ValidationError::AmountError(AmountIssue::OutOfRange { output_index: 0, .. }))
        ));
    }

    #[test]
    fn uri_not_matching_details_is_invalid_condition() {
        let (alice, bob) = (generate_keypair(), generate_keypair());
        let mut prepared = prepare_create(&[&alice.public_key], None, None, None).unwrap();
        let other = prepare_create(&[&bob.public_key], None, None, None).unwrap();
        prepared.outputs[0].condition.uri = other.outputs[0].condition.uri.clone();
        let tx = fulfill(&prepared, &[&alice.private_key]).unwrap();
        let err = validate_transaction(&tx, &MemoryLedger::new()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCondition { output_index: 0, .. }));
        assert_eq!(err.stage(), ValidationStage::SignatureChecked);
    }

    #[test]
    fn wrong_id_is_invalid_hash() {
        let alice = generate_keypair();
        let mut tx = fulfill(
            &prepare_create(&[&alice.public_key], None, None, None).unwrap(),
            &[&alice.private_key],
        )
        .unwrap();
        let real = tx.id.clone().unwrap();
        tx.id = Some("00".repeat(32));
        match validate_transaction(&tx, &MemoryLedger::new()) {
            Err(ValidationError::InvalidHash { expected, found }) => {
                assert_eq!(expected, real);
                assert_eq!(found, Some("00".repeat(32)));
            }
            other => panic!("expected InvalidHash, got {:?}", other),
        }
    }

    #[test]
    fn validation_does_not_mutate() {
        let w = world();
        let tx = bob_pays(&w, 4, 6);
        let before = tx.clone();
        let _ = Validator::new(&w.ledger).validate(&tx);
        assert_eq!(tx, before);
    }

    #[test]
    fn structure_errors() {
        let alice = generate_keypair();
        let mut tx = fulfill(
            &prepare_create(&[&alice.public_key], None, None, None).unwrap(),
            &[&alice.private_key],
        )
        .unwrap();
        tx.version = "1.0".into();
        assert!(matches!(
            validate_transaction(&tx, &MemoryLedger::new()),
            Err(ValidationError::InvalidStructure(_))
        ));
    }
}
