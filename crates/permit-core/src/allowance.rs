//! per (owner, asset, spender) allowance records and their state machine
//!
//! the signer-supplied logical timestamp, not delivery order, serializes
//! updates. two ledgers may receive their slices of one commitment in any
//! order and at any delay, yet converge to the same record state, because
//! latest-timestamp-wins is commutative under reordering for every
//! non-transfer mode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::operation::{AssetRef, Operation};
use crate::{Address, Amount, PermitError, Result, Timestamp};

/// expiration sentinel meaning the record is locked
pub const EXPIRATION_LOCKED: Timestamp = Timestamp::MAX;

/// amount sentinel: unlimited allowance on update, force-zero on decrease
pub const UNLIMITED: Amount = Amount::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllowanceKey {
    pub owner: Address,
    pub asset: AssetRef,
    pub spender: Address,
}

/// a single allowance record
///
/// created lazily on first write, never deleted, only zeroed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceRecord {
    /// current spendable quantity; `UNLIMITED` never decrements
    pub amount: Amount,
    /// 0 = never expires, `EXPIRATION_LOCKED` = locked, otherwise a cutoff
    pub expiration: Timestamp,
    /// signer-supplied logical clock, only ever moves forward
    pub last_updated: Timestamp,
}

impl AllowanceRecord {
    pub fn is_locked(&self) -> bool {
        self.expiration == EXPIRATION_LOCKED
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiration != 0 && !self.is_locked() && now > self.expiration
    }

    /// decrease mode: no timestamp guard, saturates at zero
    fn decrease(&mut self, amount: Amount) {
        if amount == UNLIMITED {
            self.amount = 0;
        } else {
            self.amount = self.amount.saturating_sub(amount);
        }
    }

    /// lock mode: always zeroes and freezes, but a re-lock with a stale
    /// timestamp is rejected and the clock never rewinds
    fn lock(&mut self, ts: Timestamp) -> Result<()> {
        if self.is_locked() && ts <= self.last_updated {
            return Err(PermitError::AllowanceLocked);
        }
        self.amount = 0;
        self.expiration = EXPIRATION_LOCKED;
        self.last_updated = self.last_updated.max(ts);
        Ok(())
    }

    /// unlock mode: only a strictly newer timestamp may clear the lock
    fn unlock(&mut self, ts: Timestamp) -> Result<()> {
        if ts <= self.last_updated {
            return Err(PermitError::StaleTimestamp {
                ts,
                stored: self.last_updated,
            });
        }
        self.expiration = 0;
        self.last_updated = ts;
        Ok(())
    }

    /// increase/update mode: latest logical timestamp wins
    ///
    /// an older-or-equal timestamp on an unlocked record is already
    /// superseded and ignored (`Ok(false)`), on a locked record it is an
    /// error; a strictly newer one applies and implicitly clears a lock
    fn update(&mut self, expiration: Timestamp, amount_delta: Amount, ts: Timestamp) -> Result<bool> {
        if ts <= self.last_updated {
            if self.is_locked() {
                return Err(PermitError::AllowanceLocked);
            }
            return Ok(false);
        }
        self.expiration = expiration;
        if amount_delta == UNLIMITED {
            self.amount = UNLIMITED;
        } else {
            self.amount = self.amount.saturating_add(amount_delta);
        }
        self.last_updated = ts;
        Ok(true)
    }
}

/// the mutable allowance map for one ledger
///
/// created at system initialization and mutated only through the state
/// machine; records are never removed
#[derive(Clone, Debug, Default)]
pub struct AllowanceStore {
    records: HashMap<AllowanceKey, AllowanceRecord>,
}

impl AllowanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// current record, a zeroed default if none was ever written
    pub fn get(&self, key: &AllowanceKey) -> AllowanceRecord {
        self.records.get(key).copied().unwrap_or_default()
    }

    /// apply one non-transfer operation for `owner` at logical time `ts`
    ///
    /// returns the mutated key and record for event emission, or `None`
    /// when the operation was a superseded no-op (or a transfer, which
    /// never touches records)
    pub fn apply(
        &mut self,
        owner: Address,
        op: &Operation,
        ts: Timestamp,
    ) -> Result<Option<(AllowanceKey, AllowanceRecord)>> {
        let (asset, spender) = match op {
            Operation::Transfer { .. } => return Ok(None),
            Operation::Decrease { asset, spender, .. }
            | Operation::Lock { asset, spender }
            | Operation::Unlock { asset, spender }
            | Operation::Update { asset, spender, .. } => (*asset, *spender),
        };
        let key = AllowanceKey {
            owner,
            asset,
            spender,
        };
        let mut rec = self.get(&key);
        let changed = match op {
            Operation::Transfer { .. } => unreachable!("handled above"),
            Operation::Decrease { amount, .. } => {
                rec.decrease(*amount);
                true
            }
            Operation::Lock { .. } => {
                rec.lock(ts)?;
                true
            }
            Operation::Unlock { .. } => {
                rec.unlock(ts)?;
                true
            }
            Operation::Update {
                expiration,
                amount_delta,
                ..
            } => rec.update(*expiration, *amount_delta, ts)?,
        };
        if !changed {
            return Ok(None);
        }
        self.records.insert(key, rec);
        Ok(Some((key, rec)))
    }

    /// spender-driven consumption of an allowance
    ///
    /// a collection-wide lock always wins over a still-unlocked item
    /// record for the same spender; an item approval is never a bypass of
    /// an active collection lock
    pub fn spend(
        &mut self,
        key: &AllowanceKey,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(AllowanceKey, AllowanceRecord)> {
        let collection_key = AllowanceKey {
            owner: key.owner,
            asset: key.asset.collection(),
            spender: key.spender,
        };
        if key.asset.token_id.is_some() && self.get(&collection_key).is_locked() {
            return Err(PermitError::AllowanceLocked);
        }

        // prefer the exact record, fall back to the collection-wide one
        let chosen = if self.records.contains_key(key) {
            *key
        } else {
            collection_key
        };
        let mut rec = self.get(&chosen);
        if rec.is_locked() {
            return Err(PermitError::AllowanceLocked);
        }
        if rec.is_expired(now) {
            return Err(PermitError::AllowanceExpired {
                expiration: rec.expiration,
                now,
            });
        }
        if rec.amount != UNLIMITED {
            if amount > rec.amount {
                return Err(PermitError::InsufficientAllowance {
                    requested: amount,
                    available: rec.amount,
                });
            }
            rec.amount -= amount;
        }
        self.records.insert(chosen, rec);
        Ok((chosen, rec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        [byte; 32]
    }

    fn key() -> AllowanceKey {
        AllowanceKey {
            owner: addr(1),
            asset: AssetRef::fungible(addr(2)),
            spender: addr(3),
        }
    }

    fn update_op(expiration: Timestamp, delta: Amount) -> Operation {
        Operation::Update {
            asset: AssetRef::fungible(addr(2)),
            spender: addr(3),
            expiration,
            amount_delta: delta,
        }
    }

    fn lock_op() -> Operation {
        Operation::Lock {
            asset: AssetRef::fungible(addr(2)),
            spender: addr(3),
        }
    }

    fn unlock_op() -> Operation {
        Operation::Unlock {
            asset: AssetRef::fungible(addr(2)),
            spender: addr(3),
        }
    }

    #[test]
    fn update_then_query() {
        let mut store = AllowanceStore::new();
        store.apply(addr(1), &update_op(5000, 100), 10).unwrap();
        let rec = store.get(&key());
        assert_eq!(rec.amount, 100);
        assert_eq!(rec.expiration, 5000);
        assert_eq!(rec.last_updated, 10);
    }

    #[test]
    fn stale_update_is_silent_noop() {
        // scenario: an equal-or-older timestamp leaves the record untouched
        let mut store = AllowanceStore::new();
        store.apply(addr(1), &update_op(5000, 100), 10).unwrap();
        let before = store.get(&key());

        assert_eq!(store.apply(addr(1), &update_op(9999, 50), 10).unwrap(), None);
        assert_eq!(store.apply(addr(1), &update_op(9999, 50), 9).unwrap(), None);
        assert_eq!(store.get(&key()), before);

        // strictly newer applies both fields
        store.apply(addr(1), &update_op(9999, 50), 11).unwrap();
        let after = store.get(&key());
        assert_eq!(after.amount, 150);
        assert_eq!(after.expiration, 9999);
        assert_eq!(after.last_updated, 11);
    }

    #[test]
    fn timestamp_order_converges_regardless_of_delivery() {
        // apply t1 < t2 in both delivery orders, final state must match
        let op1 = update_op(1000, 10);
        let op2 = update_op(2000, 20);

        let mut forward = AllowanceStore::new();
        forward.apply(addr(1), &op1, 1).unwrap();
        forward.apply(addr(1), &op2, 2).unwrap();

        let mut reversed = AllowanceStore::new();
        reversed.apply(addr(1), &op2, 2).unwrap();
        reversed.apply(addr(1), &op1, 1).unwrap();

        assert_eq!(forward.get(&key()), reversed.get(&key()));
    }

    #[test]
    fn decrease_saturates_and_max_forces_zero() {
        let mut store = AllowanceStore::new();
        store.apply(addr(1), &update_op(0, 100), 1).unwrap();

        let dec = Operation::Decrease {
            asset: AssetRef::fungible(addr(2)),
            spender: addr(3),
            amount: 40,
        };
        store.apply(addr(1), &dec, 2).unwrap();
        assert_eq!(store.get(&key()).amount, 60);

        // over-decrease saturates at zero
        let big = Operation::Decrease {
            asset: AssetRef::fungible(addr(2)),
            spender: addr(3),
            amount: 1000,
        };
        store.apply(addr(1), &big, 3).unwrap();
        assert_eq!(store.get(&key()).amount, 0);

        // MAX always lands on zero no matter the prior amount
        store.apply(addr(1), &update_op(0, UNLIMITED), 4).unwrap();
        let force = Operation::Decrease {
            asset: AssetRef::fungible(addr(2)),
            spender: addr(3),
            amount: UNLIMITED,
        };
        store.apply(addr(1), &force, 5).unwrap();
        assert_eq!(store.get(&key()).amount, 0);
    }

    #[test]
    fn lock_zeroes_and_freezes() {
        let mut store = AllowanceStore::new();
        store.apply(addr(1), &update_op(5000, 100), 1).unwrap();
        store.apply(addr(1), &lock_op(), 2).unwrap();

        let rec = store.get(&key());
        assert_eq!(rec.amount, 0);
        assert!(rec.is_locked());

        // update with older-or-equal timestamp on a locked record errors
        assert_eq!(
            store.apply(addr(1), &update_op(9000, 10), 2),
            Err(PermitError::AllowanceLocked)
        );

        // re-lock with stale timestamp rejected
        assert_eq!(
            store.apply(addr(1), &lock_op(), 2),
            Err(PermitError::AllowanceLocked)
        );
    }

    #[test]
    fn unlock_requires_strictly_newer_timestamp() {
        let mut store = AllowanceStore::new();
        store.apply(addr(1), &lock_op(), 5).unwrap();

        assert_eq!(
            store.apply(addr(1), &unlock_op(), 5),
            Err(PermitError::StaleTimestamp { ts: 5, stored: 5 })
        );

        store.apply(addr(1), &unlock_op(), 6).unwrap();
        let rec = store.get(&key());
        assert!(!rec.is_locked());
        assert_eq!(rec.amount, 0);
        assert_eq!(rec.last_updated, 6);
    }

    #[test]
    fn lock_never_rewinds_the_clock() {
        let mut store = AllowanceStore::new();
        store.apply(addr(1), &update_op(5000, 100), 10).unwrap();
        // emergency lock with an older timestamp still applies
        store.apply(addr(1), &lock_op(), 3).unwrap();
        let rec = store.get(&key());
        assert!(rec.is_locked());
        assert_eq!(rec.last_updated, 10);
    }

    #[test]
    fn unlimited_allowance_never_decrements() {
        let mut store = AllowanceStore::new();
        store.apply(addr(1), &update_op(0, UNLIMITED), 1).unwrap();
        store.spend(&key(), 1_000_000, 50).unwrap();
        assert_eq!(store.get(&key()).amount, UNLIMITED);
    }

    #[test]
    fn spend_checks_expiry_and_balance() {
        let mut store = AllowanceStore::new();
        store.apply(addr(1), &update_op(100, 50), 1).unwrap();

        assert_eq!(
            store.spend(&key(), 10, 101),
            Err(PermitError::AllowanceExpired {
                expiration: 100,
                now: 101
            })
        );
        assert_eq!(
            store.spend(&key(), 60, 50),
            Err(PermitError::InsufficientAllowance {
                requested: 60,
                available: 50
            })
        );
        let (_, rec) = store.spend(&key(), 30, 50).unwrap();
        assert_eq!(rec.amount, 20);
    }

    #[test]
    fn collection_lock_beats_item_approval() {
        let owner = addr(1);
        let spender = addr(3);
        let item = AssetRef::item(addr(2), 77);

        let mut store = AllowanceStore::new();
        // grant an item-specific, never-expiring approval
        store
            .apply(
                owner,
                &Operation::Update {
                    asset: item,
                    spender,
                    expiration: 0,
                    amount_delta: 1,
                },
                1,
            )
            .unwrap();

        // lock the whole collection
        store
            .apply(
                owner,
                &Operation::Lock {
                    asset: item.collection(),
                    spender,
                },
                2,
            )
            .unwrap();

        let item_key = AllowanceKey {
            owner,
            asset: item,
            spender,
        };
        assert_eq!(
            store.spend(&item_key, 1, 10),
            Err(PermitError::AllowanceLocked)
        );
    }

    #[test]
    fn item_spend_falls_back_to_collection_record() {
        let owner = addr(1);
        let spender = addr(3);
        let item = AssetRef::item(addr(2), 5);

        let mut store = AllowanceStore::new();
        store
            .apply(
                owner,
                &Operation::Update {
                    asset: item.collection(),
                    spender,
                    expiration: 0,
                    amount_delta: 3,
                },
                1,
            )
            .unwrap();

        let item_key = AllowanceKey {
            owner,
            asset: item,
            spender,
        };
        let (used, rec) = store.spend(&item_key, 1, 10).unwrap();
        assert_eq!(used.asset, item.collection());
        assert_eq!(rec.amount, 2);
    }
}
