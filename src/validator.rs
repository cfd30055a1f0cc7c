//! Structural transfer validation.
//!
//! Checks ownership, balance and account/mint consistency independent of
//! any attached policy. Checks run in a fixed order and stop at the first
//! failure. Nothing is mutated here; balances only move in the engine's
//! commit step.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::context::{TransferContext, TransferScenario};
use crate::types::{Metadata, TokenAccount, TokenState};

/// Structural reasons a transfer is refused before any policy runs.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuralError {
    #[error("Source, destination and asset mint do not match")]
    MintMismatch,
    #[error("Authority is not permitted to move the owner's tokens")]
    UnauthorizedOwner,
    #[error("Amount is zero or exceeds the source balance")]
    InsufficientBalance,
    #[error("Amount is invalid for a non-divisible token standard")]
    InvalidAmountForStandard,
    #[error("Source token is locked or listed")]
    TokenLocked,
    #[error("Destination balance would overflow")]
    BalanceOverflow,
}

/// Run the structural checks for a transfer.
///
/// On success returns the scenario (holder or delegate) under which the
/// authority is acting, which selects the rule set operation and drives
/// delegate bookkeeping at commit.
pub fn validate(
    context: &TransferContext,
    asset: &Metadata,
    source: &TokenAccount,
    destination: &TokenAccount,
) -> Result<TransferScenario, StructuralError> {
    // 1. Mint consistency
    if source.mint != *asset.mint() || destination.mint != *asset.mint() {
        return Err(StructuralError::MintMismatch);
    }

    // 2. Ownership and authority
    if source.owner != context.owner {
        return Err(StructuralError::UnauthorizedOwner);
    }
    let scenario = authority_scenario(context, source)?;

    // 3. Divisibility, ahead of the balance check so a non-divisible asset
    // always reports the standard violation
    if asset.token_standard().is_non_divisible() && (context.amount != 1 || source.amount != 1) {
        return Err(StructuralError::InvalidAmountForStandard);
    }

    // 4. Balance
    if context.amount == 0 || source.amount < context.amount {
        return Err(StructuralError::InsufficientBalance);
    }

    // 5. Token state
    match source.state {
        TokenState::Unlocked => {}
        TokenState::Locked => return Err(StructuralError::TokenLocked),
        TokenState::Listed => {
            if scenario != TransferScenario::SaleDelegate {
                return Err(StructuralError::TokenLocked);
            }
        }
    }

    // the destination must be able to absorb the amount
    if destination.amount.checked_add(context.amount).is_none() {
        return Err(StructuralError::BalanceOverflow);
    }

    Ok(scenario)
}

fn authority_scenario(
    context: &TransferContext,
    source: &TokenAccount,
) -> Result<TransferScenario, StructuralError> {
    if context.authority == source.owner {
        return Ok(TransferScenario::Holder);
    }

    match source.delegate {
        Some(delegate) if delegate == context.authority => {
            if source.delegated_amount < context.amount {
                return Err(StructuralError::UnauthorizedOwner);
            }
            if source.state == TokenState::Listed {
                Ok(TransferScenario::SaleDelegate)
            } else {
                Ok(TransferScenario::TransferDelegate)
            }
        }
        _ => Err(StructuralError::UnauthorizedOwner),
    }
}
