// Copyright (c) 2026 ResilientDB Contributors. MIT License.
// See LICENSE for details.

//! # resdb-driver — ResilientDB Client Library
//!
//! Builds, signs, validates and submits transactions for a ResilientDB
//! ledger. The ledger is Byzantine-fault-tolerant; this crate is the part
//! that has to be bit-exact with it, because a transaction whose hash or
//! signature differs by one byte is rejected without explanation.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **codec** — canonical JSON and SHA3-256. Everything hashed goes through here.
//! - **crypto** — Ed25519 keys (base58) and hash primitives.
//! - **condition** — crypto-conditions: ed25519 and threshold locks, DER and URIs.
//! - **transaction** — the data model, prepare / fulfill, and the validator.
//! - **transport** — multi-node HTTP with per-node exponential backoff.
//! - **driver** — `Resdb`, the namespaced HTTP API facade.
//! - **config** — protocol constants and node configuration.
//! - **logging** — opt-in `tracing` subscriber setup.
//!
//! ## Quick Start
//!
//! ```
//! use resdb_driver::crypto::generate_keypair;
//! use resdb_driver::transaction::{fulfill, prepare_create, Recipient, validate_transaction, MemoryLedger};
//!
//! let (alice, bob) = (generate_keypair(), generate_keypair());
//! let prepared = prepare_create(
//!     &[&alice.public_key],
//!     Some(vec![Recipient::single(bob.public_key.clone(), 10)]),
//!     Some(serde_json::json!({"serial": "A-1"})),
//!     None,
//! ).unwrap();
//! let signed = fulfill(&prepared, &[&alice.private_key]).unwrap();
//! assert!(validate_transaction(&signed, &MemoryLedger::new()).is_ok());
//! ```
//!
//! ## Design Philosophy
//!
//! 1. The protocol layer is synchronous and pure. Only the transport is async.
//! 2. Validation failures are values, not panics.
//! 3. The library never stores private keys.

pub mod codec;
pub mod condition;
pub mod config;
pub mod crypto;
pub mod driver;
pub mod logging;
pub mod transaction;
pub mod transport;

pub use driver::{DriverError, Resdb};
pub use transaction::{Operation, Transaction};
