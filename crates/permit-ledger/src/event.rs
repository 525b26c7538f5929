//! observable effects of successful calls
//!
//! buffered on the ledger and drained by the embedder

use permit_core::{Address, Amount, AssetRef, Salt, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    AllowanceUpdated {
        owner: Address,
        asset: AssetRef,
        spender: Address,
        amount: Amount,
        expiration: Timestamp,
        timestamp: Timestamp,
    },
    SaltConsumed {
        owner: Address,
        salt: Salt,
    },
    TransferExecuted {
        asset: AssetRef,
        from: Address,
        to: Address,
        amount: Amount,
    },
}
