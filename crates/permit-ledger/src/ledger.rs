//! the commitment orchestrator for one ledger
//!
//! call shape: validate deadline and target identity, recompute the root
//! from the supplied proof, check the signature against it, consume the
//! replay salt, then apply every operation. all local effects of one call
//! commit together or not at all.

use permit_core::{
    commitment_digest, invalidation_digest, Address, AllowanceKey, AllowanceRecord,
    AllowanceStore, Amount, AssetRef, Commitment, LedgerId, NonceStore, Operation,
    OperationBatch, PermitError, Result, Salt, SaltBatch, SignatureVerifier, Timestamp,
    ZERO_ADDRESS,
};
use tracing::{debug, info};
use unhinged_merkle::{Hash, UnhingedProof};

use crate::event::LedgerEvent;
use crate::transfer::{TokenStandard, TransferExecutor};

/// one ledger's permit state plus its collaborator seams
///
/// the host execution environment serializes calls; nothing here suspends
/// or interleaves
pub struct Ledger<V, X> {
    id: LedgerId,
    allowances: AllowanceStore,
    nonces: NonceStore,
    verifier: V,
    executor: X,
    events: Vec<LedgerEvent>,
}

impl<V: SignatureVerifier, X: TransferExecutor> Ledger<V, X> {
    pub fn new(id: LedgerId, verifier: V, executor: X) -> Self {
        Self {
            id,
            allowances: AllowanceStore::new(),
            nonces: NonceStore::new(),
            verifier,
            executor,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> LedgerId {
        self.id
    }

    /// single-ledger fast path: the batch leaf is the signed root
    pub fn submit_commitment(
        &mut self,
        commitment: &Commitment,
        batch: &OperationBatch,
        signature: &[u8; 64],
        now: Timestamp,
    ) -> Result<()> {
        self.submit_inner(commitment, batch, None, signature, now)
    }

    /// cross-ledger path: the proof ties this ledger's batch to the root
    /// the owner actually signed
    pub fn submit_commitment_with_proof(
        &mut self,
        commitment: &Commitment,
        batch: &OperationBatch,
        proof: &UnhingedProof,
        signature: &[u8; 64],
        now: Timestamp,
    ) -> Result<()> {
        self.submit_inner(commitment, batch, Some(proof), signature, now)
    }

    fn submit_inner(
        &mut self,
        commitment: &Commitment,
        batch: &OperationBatch,
        proof: Option<&UnhingedProof>,
        signature: &[u8; 64],
        now: Timestamp,
    ) -> Result<()> {
        self.check_deadline(commitment.deadline, now)?;
        self.check_target(batch.ledger_id)?;
        if commitment.owner == ZERO_ADDRESS {
            return Err(PermitError::ZeroAddress("owner"));
        }
        batch.validate()?;

        let leaf = batch.leaf_hash();
        let root = self.resolve_root(&leaf, proof)?;
        let digest = commitment_digest(commitment, &root);
        self.verifier.verify(&commitment.owner, &digest, signature)?;

        if self.nonces.is_consumed(&commitment.owner, &commitment.salt) {
            return Err(PermitError::SaltConsumed);
        }

        // pure staging pass: no store mutation until the whole batch is
        // known to apply cleanly
        let mut staged = self.allowances.clone();
        let mut updates: Vec<(AllowanceKey, AllowanceRecord)> = Vec::new();
        let mut transfers: Vec<(AssetRef, Address, Amount)> = Vec::new();
        for op in &batch.operations {
            match op {
                Operation::Transfer { asset, to, amount } => {
                    check_unit_amount(asset, *amount)?;
                    transfers.push((*asset, *to, *amount));
                }
                _ => {
                    if let Some(change) = staged.apply(commitment.owner, op, commitment.timestamp)? {
                        updates.push(change);
                    }
                }
            }
        }

        // external transfers run before local commit; the executor unwinds
        // its own effects on error, so a failure here leaves this ledger's
        // state untouched
        for (asset, to, amount) in &transfers {
            self.executor.transfer(
                TokenStandard::of(asset),
                asset,
                &commitment.owner,
                to,
                *amount,
            )?;
        }

        self.nonces.consume(commitment.owner, commitment.salt)?;
        self.allowances = staged;

        for (key, rec) in updates {
            self.events.push(LedgerEvent::AllowanceUpdated {
                owner: key.owner,
                asset: key.asset,
                spender: key.spender,
                amount: rec.amount,
                expiration: rec.expiration,
                timestamp: rec.last_updated,
            });
        }
        for (asset, to, amount) in transfers {
            self.events.push(LedgerEvent::TransferExecuted {
                asset,
                from: commitment.owner,
                to,
                amount,
            });
        }
        self.events.push(LedgerEvent::SaltConsumed {
            owner: commitment.owner,
            salt: commitment.salt,
        });

        info!(
            ledger = self.id,
            owner = %hex::encode(commitment.owner),
            ops = batch.operations.len(),
            ts = commitment.timestamp,
            "commitment applied"
        );
        Ok(())
    }

    /// spender-driven transfer backed by a previously granted allowance
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        asset: AssetRef,
        amount: Amount,
        now: Timestamp,
    ) -> Result<()> {
        if spender == ZERO_ADDRESS {
            return Err(PermitError::ZeroAddress("spender"));
        }
        if owner == ZERO_ADDRESS {
            return Err(PermitError::ZeroAddress("owner"));
        }
        if to == ZERO_ADDRESS {
            return Err(PermitError::ZeroAddress("to"));
        }
        if asset.address == ZERO_ADDRESS {
            return Err(PermitError::ZeroAddress("asset"));
        }
        check_unit_amount(&asset, amount)?;

        let key = AllowanceKey {
            owner,
            asset,
            spender,
        };
        let mut staged = self.allowances.clone();
        let (used_key, rec) = staged.spend(&key, amount, now)?;
        self.executor
            .transfer(TokenStandard::of(&asset), &asset, &owner, &to, amount)?;
        self.allowances = staged;

        self.events.push(LedgerEvent::AllowanceUpdated {
            owner: used_key.owner,
            asset: used_key.asset,
            spender: used_key.spender,
            amount: rec.amount,
            expiration: rec.expiration,
            timestamp: rec.last_updated,
        });
        self.events.push(LedgerEvent::TransferExecuted {
            asset,
            from: owner,
            to,
            amount,
        });
        debug!(
            ledger = self.id,
            spender = %hex::encode(spender),
            amount,
            "allowance spent"
        );
        Ok(())
    }

    /// self-authorized pre-burn of pending salts, no signature needed
    pub fn invalidate_salts(&mut self, owner: Address, salts: &[Salt]) -> Result<()> {
        if owner == ZERO_ADDRESS {
            return Err(PermitError::ZeroAddress("owner"));
        }
        if salts.is_empty() {
            return Err(PermitError::EmptySaltList);
        }
        for salt in salts {
            self.nonces.invalidate(owner, *salt);
            self.events.push(LedgerEvent::SaltConsumed {
                owner,
                salt: *salt,
            });
        }
        debug!(ledger = self.id, count = salts.len(), "salts invalidated");
        Ok(())
    }

    /// third-party-submitted cancel, proof-gated exactly like a normal
    /// commitment so one signature can burn pending salts on every ledger
    pub fn invalidate_salts_signed(
        &mut self,
        commitment: &Commitment,
        batch: &SaltBatch,
        proof: Option<&UnhingedProof>,
        signature: &[u8; 64],
        now: Timestamp,
    ) -> Result<()> {
        self.check_deadline(commitment.deadline, now)?;
        self.check_target(batch.ledger_id)?;
        if commitment.owner == ZERO_ADDRESS {
            return Err(PermitError::ZeroAddress("owner"));
        }
        batch.validate()?;

        let leaf = batch.leaf_hash();
        let root = self.resolve_root(&leaf, proof)?;
        let digest = invalidation_digest(commitment, &root);
        self.verifier.verify(&commitment.owner, &digest, signature)?;

        // the cancel itself is single-use through its own salt
        self.nonces.consume(commitment.owner, commitment.salt)?;
        for salt in &batch.salts {
            self.nonces.invalidate(commitment.owner, *salt);
            self.events.push(LedgerEvent::SaltConsumed {
                owner: commitment.owner,
                salt: *salt,
            });
        }
        info!(
            ledger = self.id,
            owner = %hex::encode(commitment.owner),
            count = batch.salts.len(),
            "signed salt invalidation applied"
        );
        Ok(())
    }

    pub fn allowance(
        &self,
        owner: Address,
        asset: AssetRef,
        spender: Address,
    ) -> AllowanceRecord {
        self.allowances.get(&AllowanceKey {
            owner,
            asset,
            spender,
        })
    }

    pub fn is_salt_consumed(&self, owner: &Address, salt: &Salt) -> bool {
        self.nonces.is_consumed(owner, salt)
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    fn check_deadline(&self, deadline: Timestamp, now: Timestamp) -> Result<()> {
        if now > deadline {
            return Err(PermitError::DeadlineExpired { deadline, now });
        }
        Ok(())
    }

    fn check_target(&self, batch_ledger: LedgerId) -> Result<()> {
        if batch_ledger != self.id {
            return Err(PermitError::WrongLedger {
                batch: batch_ledger,
                local: self.id,
            });
        }
        Ok(())
    }

    fn resolve_root(&self, leaf: &Hash, proof: Option<&UnhingedProof>) -> Result<Hash> {
        match proof {
            Some(p) => Ok(p.compute_root(leaf)?),
            None => Ok(*leaf),
        }
    }
}

/// check a batch proof against an already-known root without applying
/// anything; structural problems are proof errors, a clean recomputation
/// landing elsewhere is a root mismatch
pub fn verify_batch_proof(
    batch: &OperationBatch,
    proof: &UnhingedProof,
    root: &Hash,
) -> Result<()> {
    if !proof.verify(&batch.leaf_hash(), root)? {
        return Err(PermitError::RootMismatch);
    }
    Ok(())
}

fn check_unit_amount(asset: &AssetRef, amount: Amount) -> Result<()> {
    if asset.token_id.is_some() && amount != 1 {
        return Err(PermitError::NonUnitNftAmount(amount));
    }
    Ok(())
}
