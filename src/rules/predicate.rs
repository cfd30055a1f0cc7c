//! Deterministic evaluation of primitive predicates.
//!
//! A predicate reads only the transfer context and its own parameters.

use crate::engine::context::TransferContext;
use crate::rules::types::Predicate;

/// Evaluate a single predicate against a transfer context.
pub fn evaluate_predicate(predicate: &Predicate, context: &TransferContext) -> bool {
    match predicate {
        Predicate::PubkeyMatch { keys } => keys.contains(&context.destination_owner),
        Predicate::ProgramOwned { programs } => {
            programs.contains(&context.destination_owner_program)
        }
        Predicate::Amount { amount, operator } => operator.apply(context.amount, *amount),
        Predicate::Pass => true,
    }
}
