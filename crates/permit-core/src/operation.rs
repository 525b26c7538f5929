//! permit operations and their canonical batch hash
//!
//! the wire form carries a single `mode_or_expiration` integer. it is
//! decoded into a tagged enum exactly once at the boundary; nothing
//! downstream re-inspects the raw value.

use serde::{Deserialize, Serialize};
use unhinged_merkle::Hash;

use crate::{Address, Amount, LedgerId, PermitError, Result, Timestamp, ZERO_ADDRESS};

/// domain tag for batch leaf hashing
const BATCH_DOMAIN: &[u8] = b"permit:batch:v1";

const MODE_TRANSFER: u64 = 0;
const MODE_DECREASE: u64 = 1;
const MODE_LOCK: u64 = 2;
const MODE_UNLOCK: u64 = 3;

/// asset reference with dual scope
///
/// `token_id: None` addresses the whole collection (or a fungible token),
/// `Some(id)` a single item within it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub address: Address,
    pub token_id: Option<u64>,
}

impl AssetRef {
    pub fn fungible(address: Address) -> Self {
        Self {
            address,
            token_id: None,
        }
    }

    pub fn item(address: Address, token_id: u64) -> Self {
        Self {
            address,
            token_id: Some(token_id),
        }
    }

    /// the collection-wide reference this asset falls under
    pub fn collection(&self) -> Self {
        Self {
            address: self.address,
            token_id: None,
        }
    }

    fn encode_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&self.address);
        match self.token_id {
            None => {
                hasher.update(&[0]);
            }
            Some(id) => {
                hasher.update(&[1]);
                hasher.update(&id.to_le_bytes());
            }
        }
    }
}

/// one authorized operation, decoded from the wire tuple
/// `(mode_or_expiration, asset, account, amount_delta)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// immediate transfer from the owner; executes externally, mutates no
    /// record
    Transfer {
        asset: AssetRef,
        to: Address,
        amount: Amount,
    },
    /// reduce an allowance, saturating at zero; `Amount::MAX` forces zero
    Decrease {
        asset: AssetRef,
        spender: Address,
        amount: Amount,
    },
    /// emergency: zero and freeze the record
    Lock { asset: AssetRef, spender: Address },
    /// explicit exit from the locked state
    Unlock { asset: AssetRef, spender: Address },
    /// set a new expiration and increase the amount, latest logical
    /// timestamp wins
    Update {
        asset: AssetRef,
        spender: Address,
        expiration: Timestamp,
        amount_delta: Amount,
    },
}

impl Operation {
    /// decode the wire tuple; any `mode_or_expiration > 3` carries the new
    /// expiration timestamp
    pub fn from_wire(
        mode_or_expiration: u64,
        asset: AssetRef,
        account: Address,
        amount_delta: Amount,
    ) -> Self {
        match mode_or_expiration {
            MODE_TRANSFER => Self::Transfer {
                asset,
                to: account,
                amount: amount_delta,
            },
            MODE_DECREASE => Self::Decrease {
                asset,
                spender: account,
                amount: amount_delta,
            },
            MODE_LOCK => Self::Lock {
                asset,
                spender: account,
            },
            MODE_UNLOCK => Self::Unlock {
                asset,
                spender: account,
            },
            expiration => Self::Update {
                asset,
                spender: account,
                expiration,
                amount_delta,
            },
        }
    }

    pub fn asset(&self) -> &AssetRef {
        match self {
            Self::Transfer { asset, .. }
            | Self::Decrease { asset, .. }
            | Self::Lock { asset, .. }
            | Self::Unlock { asset, .. }
            | Self::Update { asset, .. } => asset,
        }
    }

    /// recipient for transfers, spender for everything else
    pub fn account(&self) -> &Address {
        match self {
            Self::Transfer { to, .. } => to,
            Self::Decrease { spender, .. }
            | Self::Lock { spender, .. }
            | Self::Unlock { spender, .. }
            | Self::Update { spender, .. } => spender,
        }
    }

    /// raw wire value, used only for canonical hashing
    fn wire_mode(&self) -> u64 {
        match self {
            Self::Transfer { .. } => MODE_TRANSFER,
            Self::Decrease { .. } => MODE_DECREASE,
            Self::Lock { .. } => MODE_LOCK,
            Self::Unlock { .. } => MODE_UNLOCK,
            Self::Update { expiration, .. } => *expiration,
        }
    }

    fn amount_delta(&self) -> Amount {
        match self {
            Self::Transfer { amount, .. } | Self::Decrease { amount, .. } => *amount,
            Self::Lock { .. } | Self::Unlock { .. } => 0,
            Self::Update { amount_delta, .. } => *amount_delta,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.asset().address == ZERO_ADDRESS {
            return Err(PermitError::ZeroAddress("asset"));
        }
        if *self.account() == ZERO_ADDRESS {
            return Err(PermitError::ZeroAddress("account"));
        }
        Ok(())
    }

    fn encode_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&self.wire_mode().to_le_bytes());
        self.asset().encode_into(hasher);
        hasher.update(self.account());
        hasher.update(&self.amount_delta().to_le_bytes());
    }
}

/// the slice of a signed commitment intended for one specific ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationBatch {
    pub ledger_id: LedgerId,
    pub operations: Vec<Operation>,
}

impl OperationBatch {
    pub fn new(ledger_id: LedgerId, operations: Vec<Operation>) -> Self {
        Self {
            ledger_id,
            operations,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.operations.is_empty() {
            return Err(PermitError::EmptyBatch);
        }
        for op in &self.operations {
            op.validate()?;
        }
        Ok(())
    }

    /// canonical leaf hash binding the target ledger and every operation
    /// in order
    pub fn leaf_hash(&self) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(BATCH_DOMAIN);
        hasher.update(&self.ledger_id.to_le_bytes());
        hasher.update(&(self.operations.len() as u64).to_le_bytes());
        for op in &self.operations {
            op.encode_into(&mut hasher);
        }
        *hasher.finalize().as_bytes()
    }
}
