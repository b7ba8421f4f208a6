//! Committed ledger state, as seen by the validator.
//!
//! [`LedgerView`] is the seam: the validator only needs to look up
//! committed transactions and ask who spent an output. [`MemoryLedger`] is
//! an in-process implementation used by tests, examples and anyone
//! simulating the server locally.

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use super::model::Transaction;
use super::types::TransactionLink;
use super::verification::{ValidationError, Validator};

/// Read access to committed transactions.
pub trait LedgerView {
    /// A committed transaction by id.
    fn get_transaction(&self, id: &str) -> Option<Transaction>;

    /// Id of the committed transaction that spends `link`, if any.
    fn spent_by(&self, link: &TransactionLink) -> Option<String>;

    fn contains(&self, id: &str) -> bool {
        self.get_transaction(id).is_some()
    }
}

/// Thread-safe in-memory ledger.
///
/// Reads are lock-free; commits are serialized so validate-then-insert is
/// atomic and two racing spends of one output cannot both land.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    transactions: DashMap<String, Transaction>,
    spends: DashMap<TransactionLink, String>,
    commit_lock: Mutex<()>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `tx` against the current state and commit it. Returns the id.
    pub fn commit(&self, tx: Transaction) -> Result<String, ValidationError> {
        let _guard = self.commit_lock.lock();
        Validator::new(self).validate(&tx)?;

        // A validated transaction always carries its id.
        let id = tx.id.clone().unwrap_or_default();
        for input in &tx.inputs {
            if let Some(link) = &input.fulfills {
                self.spends.insert(link.clone(), id.clone());
            }
        }
        self.transactions.insert(id.clone(), tx);
        debug!(id = %id, committed = self.transactions.len(), "committed transaction");
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl LedgerView for MemoryLedger {
    fn get_transaction(&self, id: &str) -> Option<Transaction> {
        self.transactions.get(id).map(|entry| entry.value().clone())
    }

    fn spent_by(&self, link: &TransactionLink) -> Option<String> {
        self.spends.get(link).map(|entry| entry.value().clone())
    }

    fn contains(&self, id: &str) -> bool {
        self.transactions.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;
    use crate::transaction::{fulfill, prepare_create, prepare_transfer, Asset, Recipient, TransferInput};
    use std::sync::Arc;

    #[test]
    fn commit_records_spends() {
        let alice = generate_keypair();
        let ledger = MemoryLedger::new();
        let create = fulfill(
            &prepare_create(&[&alice.public_key], None, None, None).unwrap(),
            &[&alice.private_key],
        )
        .unwrap();
        let create_id = ledger.commit(create.clone()).unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(&create_id));

        let transfer = fulfill(
            &prepare_transfer(
                vec![TransferInput::from_output(&create, 0).unwrap()],
                vec![Recipient::single(alice.public_key.clone(), 1)],
                Asset::link(create_id.clone()),
                None,
            )
            .unwrap(),
            &[&alice.private_key],
        )
        .unwrap();
        let transfer_id = ledger.commit(transfer).unwrap();
        assert_eq!(
            ledger.spent_by(&TransactionLink::new(create_id, 0)),
            Some(transfer_id)
        );
    }

    #[test]
    fn invalid_transactions_are_not_committed() {
        let alice = generate_keypair();
        let ledger = MemoryLedger::new();
        let prepared = prepare_create(&[&alice.public_key], None, None, None).unwrap();
        assert!(ledger.commit(prepared).is_err());
        assert!(ledger.is_empty());
    }

    #[test]
    fn concurrent_spends_of_one_output_admit_one() {
        let alice = generate_keypair();
        let ledger = Arc::new(MemoryLedger::new());
        let create = fulfill(
            &prepare_create(&[&alice.public_key], None, None, None).unwrap(),
            &[&alice.private_key],
        )
        .unwrap();
        ledger.commit(create.clone()).unwrap();

        let spends: Vec<_> = (0..4)
            .map(|i| {
                let mut prepared = prepare_transfer(
                    vec![TransferInput::from_output(&create, 0).unwrap()],
                    vec![Recipient::single(alice.public_key.clone(), 1)],
                    Asset::link(create.id.clone().unwrap()),
                    Some(serde_json::json!({"attempt": i})),
                )
                .unwrap();
                prepared = fulfill(&prepared, &[&alice.private_key]).unwrap();
                prepared
            })
            .collect();

        let handles: Vec<_> = spends
            .into_iter()
            .map(|tx| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.commit(tx).is_ok())
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 1);
    }
}
