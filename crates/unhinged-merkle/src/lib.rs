//! hybrid merkle proofs for cross-ledger commitments
//!
//! one signed root attests to an ordered sequence of per-ledger subtree
//! roots. each ledger proves membership of its own batch with a balanced
//! subtree proof plus a sequential hash chain over the other ledgers'
//! roots, so per-ledger proof data stays minimal.

pub mod proof;

pub use proof::{subtree_root, ProofCounts, ProofError, UnhingedProof};

pub type Hash = [u8; 32];

/// all-zero hash, reserved on the wire to mean "no pre-hash"
pub const ZERO_HASH: Hash = [0u8; 32];

/// domain tag for chain nodes
const NODE_DOMAIN: &[u8] = b"unhinged:node:v1";

/// non-commutative combine, folds per-ledger roots left to right
pub fn ordered_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(NODE_DOMAIN);
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}

/// commutative combine for balanced-subtree steps
///
/// inputs are hashed in numeric order so a verifier only needs the sibling
/// value, never its left/right position
pub fn sorted_hash(a: &Hash, b: &Hash) -> Hash {
    if a <= b {
        ordered_hash(a, b)
    } else {
        ordered_hash(b, a)
    }
}

/// fold an ordered sequence of subtree roots into one unhinged root
///
/// empty input yields the zero hash, a single root passes through
/// unchanged; folding order is significant and producer and verifiers must
/// agree on it
pub fn fold_roots(roots: &[Hash]) -> Hash {
    match roots {
        [] => ZERO_HASH,
        [single] => *single,
        [first, rest @ ..] => rest.iter().fold(*first, |acc, r| ordered_hash(&acc, r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(byte: u8) -> Hash {
        [byte; 32]
    }

    #[test]
    fn ordered_hash_is_order_sensitive() {
        let a = h(1);
        let b = h(2);
        assert_ne!(ordered_hash(&a, &b), ordered_hash(&b, &a));
    }

    #[test]
    fn sorted_hash_is_commutative() {
        let a = h(7);
        let b = h(200);
        assert_eq!(sorted_hash(&a, &b), sorted_hash(&b, &a));
    }

    #[test]
    fn fold_empty_is_zero() {
        assert_eq!(fold_roots(&[]), ZERO_HASH);
    }

    #[test]
    fn fold_single_is_identity() {
        let r = h(9);
        assert_eq!(fold_roots(&[r]), r);
    }

    #[test]
    fn fold_is_left_associative() {
        let (r1, r2, r3) = (h(1), h(2), h(3));
        let expected = ordered_hash(&ordered_hash(&r1, &r2), &r3);
        assert_eq!(fold_roots(&[r1, r2, r3]), expected);
    }

    #[test]
    fn fold_order_changes_result() {
        let (r1, r2, r3) = (h(1), h(2), h(3));
        assert_ne!(fold_roots(&[r1, r2, r3]), fold_roots(&[r3, r2, r1]));
        assert_ne!(fold_roots(&[r1, r2]), fold_roots(&[r2, r1]));
    }
}
