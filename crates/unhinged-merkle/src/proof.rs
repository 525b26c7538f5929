//! unhinged proof construction and verification
//!
//! a proof carries one flat node sequence: an optional pre-hash (the fold
//! of every ledger ordered before this one), the balanced-subtree siblings
//! for the local batch, then the roots of every ledger ordered after.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ordered_hash, sorted_hash, Hash, ZERO_HASH};

/// counts are carried in 120 bits each on the wire
pub const MAX_COUNT: u128 = 1 << 120;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProofError {
    /// node array length disagrees with the declared counts, in either
    /// direction
    #[error("proof has {got} nodes, counts require {need}")]
    LengthMismatch { need: u128, got: u128 },

    /// pre-hash flag set but the first node is the reserved zero hash
    #[error("pre-hash flag set but node is the reserved zero hash")]
    PreHashInconsistent,

    #[error("proof count exceeds 2^120")]
    CountOutOfRange,

    /// packed counts word has reserved flag bits set
    #[error("reserved bits set in packed counts")]
    ReservedBits,
}

/// explicit, range-validated replacement for a packed counts scalar
///
/// `has_pre_hash` is independent state, never inferred from the pre-hash
/// value, so a zero pre-hash can no longer be conflated with "absent"
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofCounts {
    subtree: u128,
    following: u128,
    has_pre_hash: bool,
}

impl ProofCounts {
    pub fn new(subtree: u128, following: u128, has_pre_hash: bool) -> Result<Self, ProofError> {
        if subtree >= MAX_COUNT || following >= MAX_COUNT {
            return Err(ProofError::CountOutOfRange);
        }
        Ok(Self {
            subtree,
            following,
            has_pre_hash,
        })
    }

    pub fn subtree(&self) -> u128 {
        self.subtree
    }

    pub fn following(&self) -> u128 {
        self.following
    }

    pub fn has_pre_hash(&self) -> bool {
        self.has_pre_hash
    }

    /// total nodes the proof must carry for these counts
    pub fn required_nodes(&self) -> u128 {
        self.subtree + self.following + u128::from(self.has_pre_hash)
    }

    /// 32-byte wire form: subtree count in the top 120 bits, following
    /// count in the next 120, pre-hash flag in the lowest bit
    pub fn pack(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        // counts are < 2^120 so the top byte of each u128 is zero
        word[..15].copy_from_slice(&self.subtree.to_be_bytes()[1..]);
        word[15..30].copy_from_slice(&self.following.to_be_bytes()[1..]);
        word[31] = u8::from(self.has_pre_hash);
        word
    }

    pub fn unpack(word: [u8; 32]) -> Result<Self, ProofError> {
        if word[30] != 0 || word[31] & !1 != 0 {
            return Err(ProofError::ReservedBits);
        }
        let mut buf = [0u8; 16];
        buf[1..].copy_from_slice(&word[..15]);
        let subtree = u128::from_be_bytes(buf);
        buf = [0u8; 16];
        buf[1..].copy_from_slice(&word[15..30]);
        let following = u128::from_be_bytes(buf);
        Self::new(subtree, following, word[31] == 1)
    }
}

/// fold a flat sibling list against a leaf, sorting at each step
///
/// this is the standard membership-proof form; an empty list is the
/// single-leaf tree whose root is the leaf itself
pub fn subtree_root(leaf: &Hash, siblings: &[Hash]) -> Hash {
    siblings.iter().fold(*leaf, |acc, sib| sorted_hash(&acc, sib))
}

/// proof that one ledger's batch hash is consistent with the signed root
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnhingedProof {
    /// pre-hash (if any), then subtree siblings, then following roots
    pub nodes: Vec<Hash>,
    pub counts: ProofCounts,
}

impl UnhingedProof {
    /// assemble a proof from its three logical parts
    pub fn new(
        pre_hash: Option<Hash>,
        subtree_siblings: &[Hash],
        following: &[Hash],
    ) -> Result<Self, ProofError> {
        let counts = ProofCounts::new(
            subtree_siblings.len() as u128,
            following.len() as u128,
            pre_hash.is_some(),
        )?;
        let mut nodes = Vec::with_capacity(counts.required_nodes() as usize);
        if let Some(pre) = pre_hash {
            nodes.push(pre);
        }
        nodes.extend_from_slice(subtree_siblings);
        nodes.extend_from_slice(following);
        Ok(Self { nodes, counts })
    }

    /// recompute the root this proof commits `leaf` to
    ///
    /// fails on structural problems (node array shorter or longer than the
    /// declared counts, zero pre-hash with the flag set); never reads out
    /// of bounds and never silently ignores trailing nodes, so exactly one
    /// node encoding exists per (counts, nodes) claim
    pub fn compute_root(&self, leaf: &Hash) -> Result<Hash, ProofError> {
        let need = self.counts.required_nodes();
        if (self.nodes.len() as u128) != need {
            return Err(ProofError::LengthMismatch {
                need,
                got: self.nodes.len() as u128,
            });
        }
        // bounded by nodes.len() from here on, casts are exact
        let need = need as usize;

        let mut cursor = 0usize;
        let pre_hash = if self.counts.has_pre_hash() {
            let pre = self.nodes.first().ok_or(ProofError::LengthMismatch {
                need: need as u128,
                got: 0,
            })?;
            if *pre == ZERO_HASH {
                return Err(ProofError::PreHashInconsistent);
            }
            cursor = 1;
            Some(*pre)
        } else {
            None
        };

        let subtree_end = cursor + self.counts.subtree() as usize;
        let local_root = subtree_root(leaf, &self.nodes[cursor..subtree_end]);

        let mut acc = match pre_hash {
            Some(pre) => ordered_hash(&pre, &local_root),
            None => local_root,
        };
        for node in &self.nodes[subtree_end..need] {
            acc = ordered_hash(&acc, node);
        }
        Ok(acc)
    }

    /// membership decision: structural problems are errors, a clean
    /// recomputation that lands on a different root is `Ok(false)` so
    /// batched callers can branch
    pub fn verify(&self, leaf: &Hash, claimed_root: &Hash) -> Result<bool, ProofError> {
        Ok(self.compute_root(leaf)? == *claimed_root)
    }
}
