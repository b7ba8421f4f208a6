//! Fulfilling a prepared transaction.
//!
//! Signing is a separate step from preparation because the keys may not be
//! available when the transaction is built (hardware wallet, remote
//! signer). Each input signs its own message (see
//! [`Transaction::input_message`]), which binds the signature to exactly
//! the output being spent.
//!
//! Private keys are matched to `owners_before` by the public key they derive,
//! not by position, so callers may pass them in any order and may pass
//! extra keys.

use std::collections::HashMap;

use tracing::debug;

use super::model::Transaction;
use super::output::owners_fulfillment;
use super::TransactionError;
use crate::crypto::PrivateKey;

/// Sign every input of `tx` and set its `id`.
///
/// Returns a new transaction; `tx` is left untouched. If any owner of any
/// input has no matching key, [`TransactionError::MissingPrivateKey`] is
/// returned and nothing is signed.
///
/// ```
/// use resdb_driver::crypto::generate_keypair;
/// use resdb_driver::transaction::{fulfill, prepare_create};
///
/// let alice = generate_keypair();
/// let prepared = prepare_create(&[alice.public_key.as_str()], None, None, None).unwrap();
/// let signed = fulfill(&prepared, &[alice.private_key.as_str()]).unwrap();
/// assert!(signed.is_fulfilled());
/// assert!(prepared.id.is_none());
/// ```
pub fn fulfill<K: AsRef<str>>(tx: &Transaction, private_keys: &[K]) -> Result<Transaction, TransactionError> {
    let keyring = private_keys
        .iter()
        .map(|k| -> Result<(String, PrivateKey), TransactionError> {
            let key = PrivateKey::from_base58(k.as_ref())?;
            Ok((key.public_key().to_base58(), key))
        })
        .collect::<Result<HashMap<String, PrivateKey>, TransactionError>>()?;

    // Resolve every key before signing anything.
    let mut signers = Vec::with_capacity(tx.inputs.len());
    for (index, input) in tx.inputs.iter().enumerate() {
        let keys = input
            .owners_before
            .iter()
            .map(|owner| {
                keyring
                    .get(owner)
                    .ok_or_else(|| TransactionError::MissingPrivateKey {
                        index,
                        public_key: owner.clone(),
                    })
            })
            .collect::<Result<Vec<&PrivateKey>, _>>()?;
        signers.push(keys);
    }

    let payload = tx.signing_payload()?;
    let mut signed = tx.clone();
    for (input, keys) in signed.inputs.iter_mut().zip(signers) {
        let message = Transaction::input_message(&payload, input);
        let mut fulfillment = owners_fulfillment(&input.owners_before)?;
        for key in keys {
            fulfillment.sign(&message, key)?;
        }
        input.fulfillment = Some(fulfillment.serialize_uri()?);
    }
    signed.id = Some(signed.compute_id()?);

    debug!(
        id = signed.id.as_deref().unwrap_or_default(),
        inputs = signed.inputs.len(),
        "fulfilled transaction"
    );
    Ok(signed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
