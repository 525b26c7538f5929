//! signing domain for commitments
//!
//! the signed digest binds (owner, salt, deadline, timestamp, root) under
//! a chain id fixed to a cross-ledger sentinel, so the same signature
//! byte-string verifies on every target ledger.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use unhinged_merkle::Hash;

use crate::{Address, LedgerId, PermitError, Result, Salt, Timestamp};

/// chain id baked into the signing domain, distinct from any real ledger id
pub const CROSS_LEDGER_DOMAIN_ID: LedgerId = LedgerId::MAX;

const COMMITMENT_DOMAIN: &[u8] = b"permit:commitment:v1";

/// separate domain for salt invalidation so a cancel signature can never
/// double as a spend signature
const INVALIDATION_DOMAIN: &[u8] = b"permit:invalidation:v1";

/// the signed tuple authorizing one or more operation batches
///
/// `timestamp` is the logical clock fed to the state machine, not
/// execution time; `deadline` is checked against the caller's wall clock
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub owner: Address,
    pub salt: Salt,
    pub deadline: Timestamp,
    pub timestamp: Timestamp,
}

fn digest(domain: &[u8], commitment: &Commitment, root: &Hash) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(&CROSS_LEDGER_DOMAIN_ID.to_le_bytes());
    hasher.update(&commitment.owner);
    hasher.update(&commitment.salt);
    hasher.update(&commitment.deadline.to_le_bytes());
    hasher.update(&commitment.timestamp.to_le_bytes());
    hasher.update(root);
    *hasher.finalize().as_bytes()
}

/// digest actually signed for a spend commitment
pub fn commitment_digest(commitment: &Commitment, root: &Hash) -> Hash {
    digest(COMMITMENT_DOMAIN, commitment, root)
}

/// digest signed for a cross-ledger salt cancel
pub fn invalidation_digest(commitment: &Commitment, root: &Hash) -> Hash {
    digest(INVALIDATION_DOMAIN, commitment, root)
}

/// seam for the external signature-recovery primitive
pub trait SignatureVerifier {
    fn verify(&self, owner: &Address, digest: &Hash, signature: &[u8; 64]) -> Result<()>;
}

/// default verifier: the owner address is the ed25519 verifying key
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, owner: &Address, digest: &Hash, signature: &[u8; 64]) -> Result<()> {
        let key = VerifyingKey::from_bytes(owner).map_err(|_| PermitError::InvalidSignature)?;
        let sig = Signature::from_bytes(signature);
        key.verify(digest.as_slice(), &sig)
            .map_err(|_| PermitError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    fn commitment() -> Commitment {
        Commitment {
            owner: [1u8; 32],
            salt: [2u8; 32],
            deadline: 1000,
            timestamp: 5,
        }
    }

    #[test]
    fn digest_binds_every_field() {
        let base = commitment();
        let root = [9u8; 32];
        let d = commitment_digest(&base, &root);

        let mut other = base;
        other.salt = [3u8; 32];
        assert_ne!(d, commitment_digest(&other, &root));

        let mut other = base;
        other.deadline = 1001;
        assert_ne!(d, commitment_digest(&other, &root));

        let mut other = base;
        other.timestamp = 6;
        assert_ne!(d, commitment_digest(&other, &root));

        assert_ne!(d, commitment_digest(&base, &[10u8; 32]));
    }

    #[test]
    fn cancel_and_spend_domains_are_disjoint() {
        let c = commitment();
        let root = [9u8; 32];
        assert_ne!(commitment_digest(&c, &root), invalidation_digest(&c, &root));
    }

    #[test]
    fn ed25519_roundtrip() {
        let signing = SigningKey::generate(&mut OsRng);
        let owner = signing.verifying_key().to_bytes();
        let c = Commitment {
            owner,
            ..commitment()
        };
        let d = commitment_digest(&c, &[9u8; 32]);
        let sig = signing.sign(d.as_slice()).to_bytes();

        Ed25519Verifier.verify(&owner, &d, &sig).unwrap();

        // wrong digest fails
        let other = commitment_digest(&c, &[10u8; 32]);
        assert_eq!(
            Ed25519Verifier.verify(&owner, &other, &sig),
            Err(PermitError::InvalidSignature)
        );

        // wrong owner fails
        let stranger = SigningKey::generate(&mut OsRng).verifying_key().to_bytes();
        assert_eq!(
            Ed25519Verifier.verify(&stranger, &d, &sig),
            Err(PermitError::InvalidSignature)
        );
    }
}
