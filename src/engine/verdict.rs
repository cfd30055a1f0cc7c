//! Authorization verdicts and denial reasons.

use alloc::string::String;
use alloc::sync::Arc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::RuleId;
use crate::types::Pubkey;
use crate::validator::StructuralError;

/// Policy-level reasons a transfer is refused.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyError {
    #[error("Programmable asset has no rule set configured")]
    MissingRuleSet,
    #[error("No rule set is published at {0}")]
    RuleSetNotFound(Pubkey),
    #[error("Rule set override {provided} does not match configured rule set {expected}")]
    RuleSetMismatch { expected: Pubkey, provided: Pubkey },
    #[error("Rule set defines no rule for operation {0}")]
    OperationNotFound(String),
    #[error("Predicate {0} failed")]
    PredicateFailed(RuleId),
    #[error("Negated rule {0} was satisfied")]
    NegatedRuleSatisfied(RuleId),
    #[error("No alternative satisfied ({} failed)", .0.len())]
    NoneSatisfied(Arc<[PolicyError]>),
    #[error("Rule tree exceeds maximum depth {limit}")]
    TreeTooDeep { limit: usize },
    #[error("Rule {0} is not present in the rule set")]
    DanglingRule(RuleId),
}

impl PolicyError {
    /// Errors that describe a broken evaluation rather than a rule outcome.
    /// These are never inverted by `Not` nor absorbed by `Any`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PolicyError::TreeTooDeep { .. } | PolicyError::DanglingRule(_))
    }
}

/// Why a transfer was denied.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    #[error("Structural check failed: {0}")]
    Structural(#[from] StructuralError),
    #[error("Policy denied transfer: {0}")]
    Policy(#[from] PolicyError),
}

/// Outcome of one authorization decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Authorized,
    Denied(DenialReason),
}

impl Verdict {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Verdict::Authorized)
    }

    pub fn denial(&self) -> Option<&DenialReason> {
        match self {
            Verdict::Authorized => None,
            Verdict::Denied(reason) => Some(reason),
        }
    }

    /// Structural reason, if the denial was structural.
    pub fn structural_error(&self) -> Option<StructuralError> {
        match self.denial() {
            Some(DenialReason::Structural(e)) => Some(*e),
            _ => None,
        }
    }

    /// Policy reason, if the denial came from policy.
    pub fn policy_error(&self) -> Option<&PolicyError> {
        match self.denial() {
            Some(DenialReason::Policy(e)) => Some(e),
            _ => None,
        }
    }
}

impl<E: Into<DenialReason>> From<Result<(), E>> for Verdict {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Verdict::Authorized,
            Err(e) => Verdict::Denied(e.into()),
        }
    }
}
