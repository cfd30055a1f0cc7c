//! Token standard classification.
//!
//! Maps an asset's declared standard to the validation path its transfers
//! must take.

use serde::{Deserialize, Serialize};

use crate::types::TokenStandard;

/// Validation path selected for a transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationPath {
    /// Structural checks only.
    Unrestricted,
    /// Structural checks and rule set evaluation.
    PolicyGated,
}

/// Classify a token standard. Total over the closed set of standards.
pub fn classify(standard: TokenStandard) -> ValidationPath {
    match standard {
        TokenStandard::Fungible
        | TokenStandard::FungibleAsset
        | TokenStandard::NonFungible
        | TokenStandard::NonFungibleEdition => ValidationPath::Unrestricted,
        TokenStandard::ProgrammableNonFungible => ValidationPath::PolicyGated,
    }
}
