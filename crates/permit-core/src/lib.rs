//! core types for cross-ledger token permits
//!
//! a signer authorizes spending permissions across independent ledgers
//! with one offline signature. each ledger applies only its own slice of
//! the signed commitment, serialized by signer-supplied logical timestamps
//! and guarded against replay by single-use salts.

pub mod allowance;
pub mod error;
pub mod nonce;
pub mod operation;
pub mod signing;

pub use allowance::{
    AllowanceKey, AllowanceRecord, AllowanceStore, EXPIRATION_LOCKED, UNLIMITED,
};
pub use error::{PermitError, Result};
pub use nonce::{NonceStore, SaltBatch};
pub use operation::{AssetRef, Operation, OperationBatch};
pub use signing::{
    commitment_digest, invalidation_digest, Commitment, Ed25519Verifier, SignatureVerifier,
    CROSS_LEDGER_DOMAIN_ID,
};

/// account identifier, ed25519 verifying-key bytes
pub type Address = [u8; 32];

/// random single-use replay-protection token, not a sequential counter
pub type Salt = [u8; 32];

pub type Amount = u128;

/// signer-chosen logical clock value or a wall-clock deadline
pub type Timestamp = u64;

/// identifier of one independent ledger
pub type LedgerId = u64;

pub const ZERO_ADDRESS: Address = [0u8; 32];
