//! per-ledger orchestration of signed cross-ledger permits
//!
//! one offline signature commits to operation batches for many ledgers;
//! this crate is the per-ledger entry point that validates the deadline
//! and target identity, ties the local batch to the signed root through an
//! unhinged proof, consumes the replay salt, and applies every operation
//! atomically against the local allowance store.
//!
//! there is no cross-ledger coordination: each ledger's slice succeeds or
//! fails on its own, and partial execution across ledgers is an accepted
//! permanent outcome.

pub mod event;
pub mod ledger;
pub mod transfer;

pub use event::LedgerEvent;
pub use ledger::{verify_batch_proof, Ledger};
pub use transfer::{RecordingExecutor, TokenStandard, TransferExecutor};
