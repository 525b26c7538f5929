//! single-use salt tracking
//!
//! one consumption flag per (owner, salt), scoped to a single ledger's
//! storage. two commitments sharing a salt but targeting different ledgers
//! each get their own flag; consumption is never synchronized across
//! ledgers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use unhinged_merkle::Hash;

use crate::{Address, LedgerId, PermitError, Result, Salt};

/// domain tag for salt-batch leaf hashing
const SALTS_DOMAIN: &[u8] = b"permit:salts:v1";

#[derive(Debug, Default, Clone)]
pub struct NonceStore {
    consumed: HashSet<(Address, Salt)>,
}

impl NonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_consumed(&self, owner: &Address, salt: &Salt) -> bool {
        self.consumed.contains(&(*owner, *salt))
    }

    /// mark a salt consumed, failing if it already was
    pub fn consume(&mut self, owner: Address, salt: Salt) -> Result<()> {
        if !self.consumed.insert((owner, salt)) {
            return Err(PermitError::SaltConsumed);
        }
        Ok(())
    }

    /// pre-burn a salt without executing anything; idempotent, so a
    /// cross-ledger cancel batch never trips over an already-burned entry
    pub fn invalidate(&mut self, owner: Address, salt: Salt) {
        self.consumed.insert((owner, salt));
    }
}

/// the salts a signed cancel burns on one specific ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaltBatch {
    pub ledger_id: LedgerId,
    pub salts: Vec<Salt>,
}

impl SaltBatch {
    pub fn new(ledger_id: LedgerId, salts: Vec<Salt>) -> Self {
        Self { ledger_id, salts }
    }

    pub fn validate(&self) -> Result<()> {
        if self.salts.is_empty() {
            return Err(PermitError::EmptySaltList);
        }
        Ok(())
    }

    /// canonical leaf hash for the proof-gated cancel path
    pub fn leaf_hash(&self) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(SALTS_DOMAIN);
        hasher.update(&self.ledger_id.to_le_bytes());
        hasher.update(&(self.salts.len() as u64).to_le_bytes());
        for salt in &self.salts {
            hasher.update(salt);
        }
        *hasher.finalize().as_bytes()
    }
}
