//! error taxonomy for permit processing
//!
//! every failure is reported synchronously and nothing is retried
//! internally; a failed call leaves no partial mutation behind

use thiserror::Error;

use crate::{Amount, LedgerId, Timestamp};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermitError {
    // signature
    #[error("deadline {deadline} passed, now {now}")]
    DeadlineExpired { deadline: Timestamp, now: Timestamp },

    #[error("signature does not verify for claimed owner")]
    InvalidSignature,

    // replay
    #[error("salt already consumed")]
    SaltConsumed,

    // identity
    #[error("batch targets ledger {batch}, executing ledger is {local}")]
    WrongLedger { batch: LedgerId, local: LedgerId },

    // proof structure
    #[error(transparent)]
    Proof(#[from] unhinged_merkle::ProofError),

    #[error("recomputed root does not match signed root")]
    RootMismatch,

    // permission
    #[error("allowance is locked")]
    AllowanceLocked,

    #[error("allowance expired at {expiration}, now {now}")]
    AllowanceExpired { expiration: Timestamp, now: Timestamp },

    #[error("requested {requested} exceeds allowance {available}")]
    InsufficientAllowance { requested: Amount, available: Amount },

    #[error("timestamp {ts} not newer than stored {stored}")]
    StaleTimestamp { ts: Timestamp, stored: Timestamp },

    // input validation
    #[error("zero address for {0}")]
    ZeroAddress(&'static str),

    #[error("operation batch is empty")]
    EmptyBatch,

    #[error("salt list is empty")]
    EmptySaltList,

    #[error("non-fungible transfer amount must be exactly 1, got {0}")]
    NonUnitNftAmount(Amount),

    // transfer collaborator
    #[error("transfer failed: {0}")]
    TransferFailed(String),
}

pub type Result<T> = std::result::Result<T, PermitError>;
