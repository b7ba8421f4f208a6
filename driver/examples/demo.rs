//! Walkthrough of the transaction lifecycle.
//!
//! Alice mints ten shares to Bob, Bob sends four back and keeps six, then
//! tries to spend the same output again. Everything is validated against
//! an in-memory ledger; pass a node URL to also submit to a live node.
//!
//! Run with:
//!   cargo run --example demo
//!   cargo run --example demo -- http://localhost:18000

use serde_json::json;

use resdb_driver::crypto::generate_keypair;
use resdb_driver::logging::{init_logging, LogFormat};
use resdb_driver::transaction::{
    fulfill, prepare_create, prepare_transfer, Asset, MemoryLedger, Recipient, Transaction,
    TransferInput,
};
use resdb_driver::Resdb;

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

fn step(n: u32, title: &str) {
    println!("\n{BOLD}{CYAN}[{n}]{RESET} {BOLD}{title}{RESET}");
}

fn show(tx: &Transaction) {
    let id = tx.id.as_deref().unwrap_or("<unsigned>");
    println!("    {DIM}id{RESET}        {id}");
    println!("    {DIM}operation{RESET} {}", tx.operation);
    for (i, output) in tx.outputs.iter().enumerate() {
        println!(
            "    {DIM}output {i}{RESET}  {} -> {}",
            output.amount,
            output.public_keys.join(", ")
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("warn", LogFormat::Pretty);
    let node = std::env::args().nth(1);

    let (alice, bob) = (generate_keypair(), generate_keypair());
    let ledger = MemoryLedger::new();

    step(1, "Alice mints 10 shares to Bob");
    let create = fulfill(
        &prepare_create(
            &[&alice.public_key],
            Some(vec![Recipient::single(bob.public_key.clone(), 10)]),
            Some(json!({"name": "bicycle", "serial": "abcd1234"})),
            Some(json!({"planet": "earth"})),
        )?,
        &[&alice.private_key],
    )?;
    show(&create);
    ledger.commit(create.clone())?;
    println!("    {GREEN}committed{RESET}");

    step(2, "Bob sends 4 to Alice and keeps 6");
    let transfer = fulfill(
        &prepare_transfer(
            vec![TransferInput::from_output(&create, 0)?],
            vec![
                Recipient::single(alice.public_key.clone(), 4),
                Recipient::single(bob.public_key.clone(), 6),
            ],
            Asset::link(create.id.clone().unwrap_or_default()),
            None,
        )?,
        &[&bob.private_key],
    )?;
    show(&transfer);
    ledger.commit(transfer.clone())?;
    println!("    {GREEN}committed{RESET}");

    step(3, "Bob tries to spend the same output again");
    let replay = fulfill(
        &prepare_transfer(
            vec![TransferInput::from_output(&create, 0)?],
            vec![Recipient::single(bob.public_key.clone(), 10)],
            Asset::link(create.id.clone().unwrap_or_default()),
            None,
        )?,
        &[&bob.private_key],
    )?;
    match ledger.commit(replay) {
        Ok(_) => println!("    {RED}accepted (this is a bug){RESET}"),
        Err(e) => println!("    {GREEN}rejected:{RESET} {e}"),
    }

    if let Some(node) = node {
        step(4, &format!("Submitting to {node}"));
        let resdb = Resdb::with_nodes([node])?;
        for tx in [&create, &transfer] {
            match resdb.transactions().send_commit(tx).await {
                Ok(id) => println!("    {GREEN}committed{RESET} {id}"),
                Err(e) => println!("    {RED}failed:{RESET} {e}"),
            }
        }
    }

    println!();
    Ok(())
}
