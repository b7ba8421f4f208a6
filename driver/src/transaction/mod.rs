//! # Transaction Module
//!
//! Preparation, fulfillment and validation of ledger transactions. Every
//! asset issuance and every change of ownership is a [`Transaction`].
//!
//! ## Architecture
//!
//! ```text
//! types.rs        — Operation, TransactionLink, Asset
//! input.rs        — Input: owners_before, fulfills, fulfillment
//! output.rs       — Output: amount locked by a crypto-condition
//! model.rs        — Transaction, signing payload, id computation
//! builder.rs      — prepare_create / prepare_transfer / prepare_transaction
//! signing.rs      — fulfill: sign every input and set the id
//! verification.rs — Validator, ValidationError
//! ledger.rs       — LedgerView seam and the in-memory MemoryLedger
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Prepare** with [`prepare_create`] or [`prepare_transfer`]. Every
//!    fulfillment and the id are `null`.
//! 2. **Fulfill** with [`fulfill`] and the owners' private keys.
//! 3. **Send** through [`crate::driver::Resdb`].
//! 4. **Validate** anything received with [`Validator`].
//!
//! A fulfilled transaction is never modified again: changing any field
//! invalidates its signatures or its id.
//!
//! ## Design Decisions
//!
//! - Amounts are `u64` on the Rust side and decimal strings on the wire,
//!   so the hash never depends on how a JSON library prints numbers.
//! - Private keys are matched to owners by the public key they derive,
//!   never by position.
//! - Validation outcomes are a `Result<_, ValidationError>`; preparation
//!   and signing mistakes are [`TransactionError`]s. Neither is retried.

pub mod builder;
pub mod error;
pub mod input;
pub mod ledger;
pub mod model;
pub mod output;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{
    prepare_create, prepare_transaction, prepare_transfer, PrepareRequest, Recipient, TransferInput,
};
pub use error::TransactionError;
pub use input::Input;
pub use ledger::{LedgerView, MemoryLedger};
pub use model::Transaction;
pub use output::{Output, OutputCondition};
pub use signing::fulfill;
pub use types::{Asset, Operation, TransactionLink};
pub use verification::{
    validate_transaction, AmountIssue, ValidationError, ValidationStage, Validator,
};
