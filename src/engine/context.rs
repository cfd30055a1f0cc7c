//! Per-request transfer context.
//!
//! Built from a [`TransferRequest`](super::TransferRequest), read by the
//! validator and the predicates, and dropped once the verdict is out.

use alloc::string::String;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::types::Pubkey;

/// Operation being authorized.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Transfer,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Transfer => "Transfer",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is moving the token relative to its owner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferScenario {
    /// The owner signs for its own tokens.
    Holder,
    /// An approved delegate moves tokens within its allowance.
    TransferDelegate,
    /// The delegate of a listed token completes a sale.
    SaleDelegate,
}

impl TransferScenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferScenario::Holder => "Holder",
            TransferScenario::TransferDelegate => "TransferDelegate",
            TransferScenario::SaleDelegate => "SaleDelegate",
        }
    }

    pub fn is_delegate(&self) -> bool {
        !matches!(self, TransferScenario::Holder)
    }
}

impl fmt::Display for TransferScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a predicate may look at. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferContext {
    /// Signer of the transfer (owner or delegate).
    pub authority: Pubkey,
    /// Owner of the source token account.
    pub owner: Pubkey,
    /// Owner of the destination token account.
    pub destination_owner: Pubkey,
    /// Program owning the destination owner's account.
    pub destination_owner_program: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub operation: Operation,
    pub scenario: TransferScenario,
}

impl TransferContext {
    /// Fully qualified operation name, e.g. `Transfer:Holder`.
    pub fn scoped_operation(&self) -> String {
        alloc::format!("{}:{}", self.operation, self.scenario)
    }
}
