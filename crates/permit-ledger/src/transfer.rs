//! transfer collaborator seam
//!
//! actual value movement happens outside this crate; the orchestrator only
//! dispatches fungible vs non-fungible and enforces the unit-amount rule

use permit_core::{Address, Amount, AssetRef, Result};

/// token-standard discriminator handed to the executor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStandard {
    Fungible,
    NonFungible,
}

impl TokenStandard {
    pub fn of(asset: &AssetRef) -> Self {
        if asset.token_id.is_some() {
            Self::NonFungible
        } else {
            Self::Fungible
        }
    }
}

/// executes value transfers on behalf of the ledger
///
/// contract: all-or-nothing. on error the executor unwinds its own partial
/// effects; the ledger will then commit no local state for the call.
pub trait TransferExecutor {
    fn transfer(
        &mut self,
        standard: TokenStandard,
        asset: &AssetRef,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<()>;
}

/// test double recording every dispatched transfer
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub transfers: Vec<(TokenStandard, AssetRef, Address, Address, Amount)>,
}

impl TransferExecutor for RecordingExecutor {
    fn transfer(
        &mut self,
        standard: TokenStandard,
        asset: &AssetRef,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<()> {
        self.transfers.push((standard, *asset, *from, *to, amount));
        Ok(())
    }
}
